// ABOUTME: Relational sink Subscriber: inserts each Position via the `insert_position` stored procedure
// ABOUTME: Grounded on the original project's internal/sampledb/database.go, translated from pgx named args to sqlx binds

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use thiserror::Error;

use crate::bus::{BusError, Event, EventPayload, Subscriber};
use crate::position::{AttrValue, Attributes, Position};

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to connect to {0}: {1}")]
    Connect(String, #[source] sqlx::Error),
}

/// A relational sink that calls a stored procedure named `insert_position`
/// for every received `Position`, matching the column order the original
/// project's sample database schema expects.
pub struct PostgresSink {
    name: String,
    pool: PgPool,
}

impl PostgresSink {
    pub async fn connect(name: impl Into<String>, uri: &str) -> Result<Self, SinkError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(uri)
            .await
            .map_err(|err| SinkError::Connect(uri.to_owned(), err))?;
        Ok(PostgresSink { name: name.into(), pool })
    }

    async fn insert(&self, position: &Position) -> Result<(), sqlx::Error> {
        sqlx::query(
            "SELECT public.insert_position($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
        )
        .bind(position.protocol)
        .bind(&position.device_id)
        .bind(position.server_time)
        .bind(position.device_time)
        .bind(position.valid())
        .bind(position.location.y)
        .bind(position.location.x)
        .bind(if position.location.dimension == crate::position::Dimension::Xyz { Some(position.location.z) } else { None })
        .bind(position.speed)
        .bind(position.course)
        .bind(&position.address)
        .bind(attributes_to_json(&position.attributes))
        .bind(position.accuracy)
        .bind(&position.network)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn attributes_to_json(attributes: &Attributes) -> serde_json::Value {
    let map: serde_json::Map<String, serde_json::Value> = attributes
        .iter()
        .map(|(key, value)| {
            let json_value = match value {
                AttrValue::Int(v) => serde_json::json!(v),
                AttrValue::Float(v) => serde_json::json!(v),
                AttrValue::Str(v) => serde_json::json!(v),
                AttrValue::Floats(v) => serde_json::json!(v),
            };
            (key.clone(), json_value)
        })
        .collect();
    serde_json::Value::Object(map)
}

#[async_trait]
impl Subscriber for PostgresSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn topics(&self) -> &[&str] {
        &[crate::bus::TOPIC_POSITION_RECEIVED]
    }

    async fn handle(&self, event: &Event) -> Result<(), BusError> {
        let EventPayload::Position(position) = &event.payload else {
            return Ok(());
        };
        self.insert(position).await.map_err(|err| BusError::Handler(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::Location;

    #[test]
    fn attributes_serialize_to_json_object() {
        let mut attrs = Attributes::new();
        attrs.insert("sat".to_owned(), AttrValue::Int(8));
        let json = attributes_to_json(&attrs);
        assert_eq!(json["sat"], serde_json::json!(8));
    }

    #[test]
    fn position_without_altitude_is_xy() {
        let position = Position::new("egts", "42", Location::xy(1.0, 2.0, true));
        assert_eq!(position.location.dimension, crate::position::Dimension::Xy);
    }
}
