//! Application Configuration
//!
//! Configuration for the portal application layer.

/// Portal application configuration
#[derive(Debug, Clone)]
pub struct PortalConfig {
    /// Shared secret for payment webhook signatures
    pub webhook_secret: Vec<u8>,
    /// Base URL for links in outgoing email
    pub frontend_base_url: String,
    /// Sender label shown on invoice notifications
    pub firm_name: String,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            webhook_secret: Vec::new(),
            frontend_base_url: "http://localhost:5173".to_string(),
            firm_name: "Hartwell Estate Planning".to_string(),
        }
    }
}

impl PortalConfig {
    /// Create config with a random webhook secret (for development)
    pub fn with_random_secret() -> Self {
        use rand::RngCore;
        let mut secret = vec![0u8; 32];
        rand::rng().fill_bytes(&mut secret);
        Self {
            webhook_secret: secret,
            ..Default::default()
        }
    }
}
