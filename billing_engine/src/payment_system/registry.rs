use std::{collections::HashMap, fmt::Debug, fs, path::Path, sync::Arc};

use billing_common::Secret;
use log::*;
use serde::Deserialize;

use crate::{
    db_types::Order,
    payment_system::{PaymentSystemError, PaymentSystemHandler, SignedCallbackHandler, SIGNED_CALLBACK},
};

/// Per-handler configuration, as loaded from the payment systems settings file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HandlerSettings {
    /// Shared secret for authenticating the payment system's callbacks
    pub secret: Secret<String>,
    /// The payment page the payer is redirected to
    #[serde(default)]
    pub payment_url: String,
    #[serde(default)]
    pub params: HashMap<String, String>,
}

pub type HandlerFactory =
    Arc<dyn Fn(&HandlerSettings) -> Result<Box<dyn PaymentSystemHandler>, PaymentSystemError> + Send + Sync>;

/// Maps handler names to handler factories and their settings.
#[derive(Clone)]
pub struct PaymentSystemRegistry {
    factories: HashMap<String, HandlerFactory>,
    settings: HashMap<String, HandlerSettings>,
}

impl Debug for PaymentSystemRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut handlers = self.factories.keys().collect::<Vec<_>>();
        handlers.sort();
        write!(f, "PaymentSystemRegistry(handlers: {handlers:?}, configured: {})", self.settings.len())
    }
}

impl Default for PaymentSystemRegistry {
    fn default() -> Self {
        let mut registry = Self { factories: HashMap::new(), settings: HashMap::new() };
        registry.register(
            SIGNED_CALLBACK,
            Arc::new(|settings: &HandlerSettings| {
                SignedCallbackHandler::new(settings).map(|h| Box::new(h) as Box<dyn PaymentSystemHandler>)
            }),
        );
        registry
    }
}

impl PaymentSystemRegistry {
    /// A registry with the built-in handlers and the given settings, keyed by handler name.
    pub fn new(settings: HashMap<String, HandlerSettings>) -> Self {
        Self { settings, ..Default::default() }
    }

    /// Loads handler settings from a JSON object keyed by handler name, e.g.
    /// `{"signed_callback": {"secret": "...", "payment_url": "https://pay.example.com/checkout"}}`.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, PaymentSystemError> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .map_err(|e| PaymentSystemError::InvalidSettings(format!("{}: {e}", path.display())))?;
        let settings = serde_json::from_str::<HashMap<String, HandlerSettings>>(&data)
            .map_err(|e| PaymentSystemError::InvalidSettings(e.to_string()))?;
        info!("💳️ Loaded settings for {} payment system handler(s) from {}", settings.len(), path.display());
        Ok(Self::new(settings))
    }

    pub fn register<S: Into<String>>(&mut self, name: S, factory: HandlerFactory) -> &mut Self {
        self.factories.insert(name.into(), factory);
        self
    }

    pub fn configure<S: Into<String>>(&mut self, name: S, settings: HandlerSettings) -> &mut Self {
        self.settings.insert(name.into(), settings);
        self
    }

    /// Builds the handler for the order's payment system.
    pub fn handler_for(&self, order: &Order) -> Result<Box<dyn PaymentSystemHandler>, PaymentSystemError> {
        let pm = order.payment_method.as_ref().ok_or(PaymentSystemError::PaymentMethodNotSet)?;
        let name = pm.handler.as_str();
        let factory = self.factories.get(name).ok_or_else(|| PaymentSystemError::UnknownHandler(name.to_string()))?;
        let settings = self.settings.get(name).ok_or_else(|| PaymentSystemError::SettingsNotFound(name.to_string()))?;
        trace!("💳️ Using payment system handler {name} for order {}", order.id);
        factory(settings)
    }
}
