use std::time::Duration;

use mongodb::options::ClientOptions;

use super::error::{MongoDaoError, MongoResult};

/// Cap applied to the exponential backoff between initial-ping retries.
const MAX_PING_BACKOFF: Duration = Duration::from_secs(5);

/// Parsed client options plus the database the store operates on.
#[derive(Clone)]
pub struct MongoConfig {
    /// Driver options parsed from the connection URI.
    pub options: ClientOptions,
    /// Database holding the request, match, and answer collections.
    pub database_name: String,
    /// How many times the initial reachability ping is retried.
    pub ping_retries: u32,
    /// Delay before the first ping retry; doubles per attempt up to a cap.
    pub ping_backoff: Duration,
}

impl MongoConfig {
    /// Build a configuration from a connection URI and optional database name.
    pub async fn from_uri(uri: &str, db_name: Option<&str>) -> MongoResult<Self> {
        let database_name = db_name.unwrap_or("quiz_duel").to_owned();
        let options =
            ClientOptions::parse(uri)
                .await
                .map_err(|source| MongoDaoError::InvalidUri {
                    uri: uri.to_owned(),
                    source,
                })?;

        Ok(Self {
            options,
            database_name,
            ping_retries: 9,
            ping_backoff: Duration::from_millis(250),
        })
    }

    /// Delay to wait before each retry, one entry per allowed retry.
    pub(super) fn backoff_schedule(&self) -> Vec<Duration> {
        let mut delays = Vec::with_capacity(self.ping_retries as usize);
        let mut delay = self.ping_backoff;
        for _ in 0..self.ping_retries {
            delays.push(delay);
            delay = (delay * 2).min(MAX_PING_BACKOFF);
        }
        delays
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_schedule_doubles_until_capped() {
        let config = MongoConfig {
            options: ClientOptions::default(),
            database_name: "quiz_duel".into(),
            ping_retries: 7,
            ping_backoff: Duration::from_millis(500),
        };

        let delays = config.backoff_schedule();
        assert_eq!(delays.len(), 7);
        assert_eq!(delays[0], Duration::from_millis(500));
        assert_eq!(delays[1], Duration::from_secs(1));
        assert_eq!(delays[2], Duration::from_secs(2));
        assert_eq!(delays[3], Duration::from_secs(4));
        // Capped from here on.
        assert_eq!(delays[4], Duration::from_secs(5));
        assert_eq!(delays[6], Duration::from_secs(5));
    }
}
