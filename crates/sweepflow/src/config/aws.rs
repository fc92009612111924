//! Settings from AWS SSM Parameter Store.
//!
//! Every parameter under the path prefix becomes a top-level settings key.
//! `DatabaseSecrets` and `RedisSecrets` hold Secrets Manager ids whose JSON
//! bodies become the `database` and `redis` sections.

use serde_json::{Map, Value};

use super::Settings;
use crate::error::ConfigError;

pub(super) async fn load(region: &str, path: &str) -> Result<Settings, ConfigError> {
    let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(aws_config::Region::new(region.to_string()))
        .load()
        .await;
    let ssm = aws_sdk_ssm::Client::new(&sdk_config);
    let secrets = aws_sdk_secretsmanager::Client::new(&sdk_config);

    let mut values = Map::new();
    let mut next_token: Option<String> = None;

    loop {
        let response = ssm
            .get_parameters_by_path()
            .path(path)
            .with_decryption(true)
            .set_next_token(next_token.take())
            .send()
            .await
            .map_err(|e| ConfigError::Remote(format!("SSM {path}: {e}")))?;

        for param in response.parameters() {
            let (Some(name), Some(value)) = (param.name(), param.value()) else {
                continue;
            };
            let key = name.strip_prefix(path).unwrap_or(name);
            let entry = match key {
                "DatabaseSecrets" => ("database", load_secret(&secrets, value).await?),
                "RedisSecrets" => ("redis", load_secret(&secrets, value).await?),
                other => (other, Value::String(value.to_string())),
            };
            values.insert(entry.0.to_string(), entry.1);
        }

        next_token = response.next_token().map(str::to_string);
        if next_token.is_none() {
            break;
        }
    }

    Ok(serde_json::from_value(Value::Object(values))?)
}

async fn load_secret(
    client: &aws_sdk_secretsmanager::Client,
    secret_id: &str,
) -> Result<Value, ConfigError> {
    let output = client
        .get_secret_value()
        .secret_id(secret_id)
        .send()
        .await
        .map_err(|e| ConfigError::Remote(format!("secret {secret_id}: {e}")))?;

    match output.secret_string() {
        Some(raw) => Ok(serde_json::from_str(raw)?),
        None => Ok(Value::Null),
    }
}
