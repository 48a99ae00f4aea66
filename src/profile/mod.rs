//! # Profile Dispatch
//!
//! EnOcean Equipment Profiles (EEPs) define how a telegram payload maps to
//! physical values. A telegram does not say which profile its payload
//! follows, so the receiver keeps a table from sender id to profile. Senders
//! without an entry are expected on a shared radio channel and are dropped.
//!
//! Profiles are plain decoding closures, so new layouts can be registered
//! without touching the dispatch code:
//!
//! ```rust
//! use enocean_rx::profile::ProfileRegistry;
//! use enocean_rx::enocean::SenderId;
//!
//! let mut registry = ProfileRegistry::with_defaults();
//! registry.register(
//!     SenderId::new([0x01, 0x02, 0x03, 0x04]),
//!     enocean_rx::profile::lookup_eep("A5-09-04").unwrap(),
//! );
//! assert_eq!(registry.len(), 2);
//! ```

pub mod a50904;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::enocean::{SenderId, Telegram};
use crate::error::ProfileError;
use crate::reading::Reading;

/// Sender bound to the CO2 sensor out of the box.
pub const DEFAULT_SENDER: SenderId = SenderId::new([0x04, 0x01, 0x89, 0xB8]);

/// EEP codes known to [`lookup_eep`].
pub const SUPPORTED_EEPS: &[&str] = &[a50904::EEP];

type DecodeFn = dyn Fn(&Telegram, DateTime<Utc>) -> Result<Reading, ProfileError> + Send + Sync;

#[derive(Clone)]
pub struct Profile {
    eep: String,
    decoder: Arc<DecodeFn>,
}

impl Profile {
    pub fn new<F>(eep: impl Into<String>, decoder: F) -> Self
    where
        F: Fn(&Telegram, DateTime<Utc>) -> Result<Reading, ProfileError> + Send + Sync + 'static,
    {
        Self {
            eep: eep.into(),
            decoder: Arc::new(decoder),
        }
    }

    pub fn eep(&self) -> &str {
        &self.eep
    }

    pub fn decode(&self, telegram: &Telegram, at: DateTime<Utc>) -> Result<Reading, ProfileError> {
        (self.decoder)(telegram, at)
    }
}

impl fmt::Debug for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Profile").field("eep", &self.eep).finish()
    }
}

/// Built-in profile for an EEP code such as `A5-09-04` (case-insensitive).
pub fn lookup_eep(code: &str) -> Option<Profile> {
    match code.trim().to_ascii_uppercase().as_str() {
        a50904::EEP => Some(a50904::profile()),
        _ => None,
    }
}

/// Sender id (uppercase hex) to profile table.
#[derive(Debug, Clone, Default)]
pub struct ProfileRegistry {
    profiles: HashMap<String, Profile>,
}

impl ProfileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the stock CO2 sensor binding.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(DEFAULT_SENDER, a50904::profile());
        registry
    }

    /// Build from `(sender, eep code)` pairs, rejecting unknown EEPs.
    pub fn from_bindings<'a, I>(bindings: I) -> Result<Self, ProfileError>
    where
        I: IntoIterator<Item = (SenderId, &'a str)>,
    {
        let mut registry = Self::new();
        for (sender, eep) in bindings {
            registry.register_eep(sender, eep)?;
        }
        Ok(registry)
    }

    /// Bind a sender, returning the profile it replaced.
    pub fn register(&mut self, sender: SenderId, profile: Profile) -> Option<Profile> {
        self.profiles.insert(sender.to_string(), profile)
    }

    pub fn register_eep(&mut self, sender: SenderId, eep: &str) -> Result<(), ProfileError> {
        let profile = lookup_eep(eep).ok_or_else(|| ProfileError::UnsupportedEep(eep.to_string()))?;
        self.register(sender, profile);
        Ok(())
    }

    pub fn unregister(&mut self, sender: SenderId) -> Option<Profile> {
        self.profiles.remove(&sender.to_string())
    }

    pub fn get(&self, sender_key: &str) -> Option<&Profile> {
        self.profiles.get(sender_key)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Run the telegram through the profile bound to its originator.
    pub fn decode(&self, telegram: &Telegram, at: DateTime<Utc>) -> Result<Reading, ProfileError> {
        let key = telegram.sender_key();
        match self.profiles.get(&key) {
            Some(profile) => profile.decode(telegram, at),
            None => Err(ProfileError::UnknownSender(key)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enocean::erp2::ErpHeader;
    use crate::reading::Co2Reading;

    fn telegram(sender: [u8; 4], payload: &[u8]) -> Telegram {
        Telegram {
            header: ErpHeader(0x22),
            extended_header: None,
            extended_telegram_type: None,
            originator: SenderId::new(sender),
            destination: None,
            payload: payload.to_vec(),
            rssi_dbm: -70,
        }
    }

    #[test]
    fn default_binding_decodes_co2_sensor() {
        let registry = ProfileRegistry::with_defaults();
        assert_eq!(registry.get("040189B8").map(|p| p.eep()), Some("A5-09-04"));

        let reading = registry
            .decode(&telegram([0x04, 0x01, 0x89, 0xB8], &[0x32, 0x19, 0x80]), Utc::now())
            .unwrap();
        assert_eq!(reading.source_id(), "040189B8");
        assert_eq!(reading.value(0), 250.0);
    }

    #[test]
    fn unknown_sender_is_reported_not_decoded() {
        let registry = ProfileRegistry::with_defaults();
        let err = registry
            .decode(&telegram([0xDE, 0xAD, 0xBE, 0xEF], &[1, 2, 3]), Utc::now())
            .unwrap_err();
        assert_eq!(err, ProfileError::UnknownSender("DEADBEEF".into()));
    }

    #[test]
    fn closures_can_be_registered() {
        let mut registry = ProfileRegistry::new();
        registry.register(
            SenderId::new([0, 0, 0, 1]),
            Profile::new("TEST", |t, at| {
                Ok(Reading::Co2(Co2Reading {
                    source_id: t.sender_key(),
                    timestamp: at,
                    concentration_ppm: u16::from(t.payload[0]),
                    temperature_c: 0.0,
                    humidity_pct: 0.0,
                    rssi_dbm: t.rssi_dbm,
                }))
            }),
        );
        let reading = registry
            .decode(&telegram([0, 0, 0, 1], &[42]), Utc::now())
            .unwrap();
        assert_eq!(reading.value(0), 42.0);
    }

    #[test]
    fn bindings_reject_unknown_eep() {
        let sender = SenderId::new([1, 2, 3, 4]);
        assert!(ProfileRegistry::from_bindings([(sender, "a5-09-04")]).is_ok());
        assert_eq!(
            ProfileRegistry::from_bindings([(sender, "F6-02-01")]).unwrap_err(),
            ProfileError::UnsupportedEep("F6-02-01".into())
        );
    }
}
