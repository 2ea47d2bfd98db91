//! Indicator identifiers.
//!
//! Each indicator is one glyph hosted inside the overlay bar. Preferences
//! key visibility by the indicator's stable key (e.g. `icon_wifi`).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Identifier of a single indicator glyph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum IndicatorId {
    Signal,
    Data,
    Carrier,
    Roaming,
    Wifi,
    Bluetooth,
    Ringer,
    Language,
    BatteryPercent,
    Battery,
    Time,
}

impl IndicatorId {
    /// Every indicator, in the order they appear on the bar.
    pub const ALL: [IndicatorId; 11] = [
        IndicatorId::Signal,
        IndicatorId::Data,
        IndicatorId::Carrier,
        IndicatorId::Roaming,
        IndicatorId::Wifi,
        IndicatorId::Bluetooth,
        IndicatorId::Ringer,
        IndicatorId::Language,
        IndicatorId::BatteryPercent,
        IndicatorId::Battery,
        IndicatorId::Time,
    ];

    /// Returns the preferences key controlling this indicator's visibility.
    pub fn key(&self) -> &'static str {
        match self {
            IndicatorId::Signal => "icon_signal",
            IndicatorId::Data => "icon_data",
            IndicatorId::Carrier => "icon_carrier",
            IndicatorId::Roaming => "icon_roaming",
            IndicatorId::Wifi => "icon_wifi",
            IndicatorId::Bluetooth => "icon_bluetooth",
            IndicatorId::Ringer => "icon_ringer",
            IndicatorId::Language => "icon_language",
            IndicatorId::BatteryPercent => "icon_battery_percent",
            IndicatorId::Battery => "icon_battery",
            IndicatorId::Time => "icon_time",
        }
    }

    /// Looks up an indicator by its preferences key.
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|id| id.key() == key)
    }
}

impl fmt::Display for IndicatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for IndicatorId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_key(s).ok_or_else(|| DomainError::UnknownIndicator(s.to_string()))
    }
}

impl TryFrom<String> for IndicatorId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<IndicatorId> for String {
    fn from(id: IndicatorId) -> Self {
        id.key().to_string()
    }
}
