use std::env;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{OdmError, Result};
use crate::schema::SchemaRegistry;

/// Which kind of database an ODM instance is associated with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OdmMode {
    DynamoDb,
    MongoDb,
}

impl fmt::Display for OdmMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OdmMode::DynamoDb => f.write_str("DynamoDB"),
            OdmMode::MongoDb => f.write_str("MongoDB"),
        }
    }
}

/// Connection parameters of a DynamoDB table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamoDbConfig {
    pub region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    pub table: String,
    #[serde(default)]
    pub schema: SchemaRegistry,
}

impl DynamoDbConfig {
    pub fn new(region: impl Into<String>, table: impl Into<String>, schema: SchemaRegistry) -> Self {
        Self {
            region: region.into(),
            endpoint: None,
            table: table.into(),
            schema,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Load connection parameters from environment variables.
    ///
    /// Environment variables:
    /// - `DYNAMODB_REGION` - AWS region (default: "us-east-1")
    /// - `DYNAMODB_ENDPOINT` - Endpoint override, e.g. a local DynamoDB (optional)
    /// - `DYNAMODB_TABLE_NAME` - Table name (default: "tyodm")
    pub fn from_env(schema: SchemaRegistry) -> Self {
        Self::from_lookup(schema, |key| env::var(key).ok())
    }

    fn from_lookup(schema: SchemaRegistry, lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            region: lookup("DYNAMODB_REGION").unwrap_or_else(|| "us-east-1".to_string()),
            endpoint: lookup("DYNAMODB_ENDPOINT").filter(|e| !e.is_empty()),
            table: lookup("DYNAMODB_TABLE_NAME").unwrap_or_else(|| "tyodm".to_string()),
            schema,
        }
    }
}

/// Connection parameters of a MongoDB collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MongoDbConfig {
    pub uri: String,
    pub database: String,
    pub collection: String,
    #[serde(default)]
    pub schema: SchemaRegistry,
}

/// Configuration of an ODM instance. The backend is resolved from its shape:
/// a `uri` selects MongoDB, otherwise DynamoDB.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OdmConfig {
    MongoDb(MongoDbConfig),
    DynamoDb(DynamoDbConfig),
}

impl OdmConfig {
    /// Parses and validates a JSON configuration document.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| OdmError::Config(e.to_string()))?;
        config.schema().validate()?;
        Ok(config)
    }

    pub fn mode(&self) -> OdmMode {
        match self {
            OdmConfig::DynamoDb(_) => OdmMode::DynamoDb,
            OdmConfig::MongoDb(_) => OdmMode::MongoDb,
        }
    }

    pub fn schema(&self) -> &SchemaRegistry {
        match self {
            OdmConfig::DynamoDb(c) => &c.schema,
            OdmConfig::MongoDb(c) => &c.schema,
        }
    }
}

impl From<DynamoDbConfig> for OdmConfig {
    fn from(config: DynamoDbConfig) -> Self {
        OdmConfig::DynamoDb(config)
    }
}

impl From<MongoDbConfig> for OdmConfig {
    fn from(config: MongoDbConfig) -> Self {
        OdmConfig::MongoDb(config)
    }
}
