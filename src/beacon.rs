/// Decoded beacon advertisements.
///
/// A [`BeaconRecord`] is identified solely by its ordered identifiers: two
/// sightings of the same beacon compare equal even when RSSI, power or data
/// differ.
use alloc::string::String;
use alloc::vec::Vec;
use core::hash::{Hash, Hasher};

use crate::error::{DistanceError, RecordError};
use crate::identifier::Identifier;

/// Pluggable distance estimation strategy.
///
/// The library ships no calibrated model; callers provide one.
pub trait DistanceCalculator {
    /// Estimate the distance in meters from the calibrated tx power and a
    /// measured (possibly averaged) RSSI.
    fn calculate_distance(&self, tx_power: i8, rssi: f64) -> f64;
}

#[derive(Debug, Clone)]
pub struct BeaconRecord {
    identifiers: Vec<Identifier>,
    data_fields: Vec<u64>,
    tx_power: i8,
    rssi: i16,
    running_average_rssi: Option<f64>,
    type_code: u64,
    manufacturer: u16,
    service_uuid: Option<u32>,
    address: Option<String>,
    name: Option<String>,
}

impl BeaconRecord {
    /// Create a record. At least one identifier is required.
    pub fn new(identifiers: Vec<Identifier>, tx_power: i8, rssi: i16) -> Result<Self, RecordError> {
        if identifiers.is_empty() {
            return Err(RecordError::NoIdentifiers);
        }
        Ok(Self {
            identifiers,
            data_fields: Vec::new(),
            tx_power,
            rssi,
            running_average_rssi: None,
            type_code: 0,
            manufacturer: 0,
            service_uuid: None,
            address: None,
            name: None,
        })
    }

    pub fn with_data_fields(mut self, data_fields: Vec<u64>) -> Self {
        self.data_fields = data_fields;
        self
    }

    pub fn with_type_code(mut self, type_code: u64) -> Self {
        self.type_code = type_code;
        self
    }

    pub fn with_manufacturer(mut self, manufacturer: u16) -> Self {
        self.manufacturer = manufacturer;
        self
    }

    pub fn with_service_uuid(mut self, service_uuid: Option<u32>) -> Self {
        self.service_uuid = service_uuid;
        self
    }

    pub fn with_address(mut self, address: Option<String>) -> Self {
        self.address = address;
        self
    }

    pub fn with_name(mut self, name: Option<String>) -> Self {
        self.name = name;
        self
    }

    pub fn with_rssi(mut self, rssi: i16) -> Self {
        self.rssi = rssi;
        self
    }

    pub fn with_running_average_rssi(mut self, average: Option<f64>) -> Self {
        self.running_average_rssi = average;
        self
    }

    pub fn identifiers(&self) -> &[Identifier] {
        &self.identifiers
    }

    /// Identifier at `index`, if the record has that many.
    pub fn identifier(&self, index: usize) -> Option<&Identifier> {
        self.identifiers.get(index)
    }

    pub fn data_fields(&self) -> &[u64] {
        &self.data_fields
    }

    pub fn tx_power(&self) -> i8 {
        self.tx_power
    }

    pub fn rssi(&self) -> i16 {
        self.rssi
    }

    pub fn running_average_rssi(&self) -> Option<f64> {
        self.running_average_rssi
    }

    pub fn type_code(&self) -> u64 {
        self.type_code
    }

    pub fn manufacturer(&self) -> u16 {
        self.manufacturer
    }

    pub fn service_uuid(&self) -> Option<u32> {
        self.service_uuid
    }

    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Estimated distance in meters.
    ///
    /// Uses the running-average RSSI when one is attached, otherwise the raw
    /// RSSI of this sighting.
    pub fn distance(&self, calculator: Option<&dyn DistanceCalculator>) -> Result<f64, DistanceError> {
        let calculator = calculator.ok_or(DistanceError::NoCalculator)?;
        let rssi = self
            .running_average_rssi
            .unwrap_or_else(|| f64::from(self.rssi));
        Ok(calculator.calculate_distance(self.tx_power, rssi))
    }
}

impl PartialEq for BeaconRecord {
    fn eq(&self, other: &Self) -> bool {
        self.identifiers == other.identifiers
    }
}

impl Eq for BeaconRecord {}

impl Hash for BeaconRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identifiers.hash(state);
    }
}
