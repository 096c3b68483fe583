mod run;

use crate::{
    endpoint::Endpoint,
    tls::{SslPolicy, TrustConfig},
};
use std::{fmt, str::FromStr, sync::Arc, time::Duration};

/// How the outcome is written to stdout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Human,
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "human" | "text" => Ok(Self::Human),
            "json" => Ok(Self::Json),
            _ => Err(format!("Invalid output format: {s}")),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Human => write!(f, "human"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Action enum representing each possible command
#[derive(Debug)]
pub enum Action {
    Diagnose {
        endpoint: Endpoint,
        trust: TrustConfig,
        policy: Arc<dyn SslPolicy>,
        timeout: Duration,
        format: OutputFormat,
    },
}

impl Action {
    /// Execute the action, returning whether the check passed
    ///
    /// # Errors
    ///
    /// Returns an error if the trust material cannot be loaded or the
    /// endpoint cannot be reached
    pub async fn execute(self) -> anyhow::Result<bool> {
        run::execute(self).await
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::tls::DefaultPolicy;

    #[test]
    fn test_output_format_from_str() {
        assert_eq!(
            "human".parse::<OutputFormat>().unwrap(),
            OutputFormat::Human
        );
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("xml".parse::<OutputFormat>().is_err());
        assert_eq!(OutputFormat::default(), OutputFormat::Human);
        assert_eq!(OutputFormat::Json.to_string(), "json");
    }

    #[test]
    fn test_action_debug() {
        let action = Action::Diagnose {
            endpoint: Endpoint::new("example.com", 443).unwrap(),
            trust: TrustConfig::default(),
            policy: Arc::new(DefaultPolicy),
            timeout: Duration::from_secs(10),
            format: OutputFormat::Human,
        };

        let debug_str = format!("{action:?}");
        assert!(debug_str.contains("Diagnose"));
        assert!(debug_str.contains("example.com"));
    }
}
