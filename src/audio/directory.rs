//! Device directory
//!
//! One snapshot per direction of the usable endpoints, rebuilt wholesale at
//! subsystem init (or on demand) and dropped at teardown.
//!
//! Names are NOT de-duplicated: two endpoints may share a sanitized name and
//! `lookup_by_name` returns the first one in enumeration order.

use std::collections::HashSet;

use crate::audio::hal::AudioHardware;
use crate::audio::types::{DeviceId, Direction, EndpointRecord};

/// Ordered endpoints for one direction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    direction: Direction,
    endpoints: Vec<EndpointRecord>,
}

impl Snapshot {
    pub fn empty(direction: Direction) -> Self {
        Self {
            direction,
            endpoints: Vec::new(),
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn endpoints(&self) -> &[EndpointRecord] {
        &self.endpoints
    }

    pub fn get(&self, index: usize) -> Option<&EndpointRecord> {
        self.endpoints.get(index)
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// First exact match wins
    pub fn lookup_by_name(&self, name: &str) -> Option<DeviceId> {
        self.endpoints
            .iter()
            .find(|endpoint| endpoint.name == name)
            .map(|endpoint| endpoint.id)
    }
}

/// Both direction snapshots, owned by the backend
#[derive(Debug, Clone)]
pub struct DeviceDirectory {
    output: Snapshot,
    capture: Snapshot,
}

impl Default for DeviceDirectory {
    fn default() -> Self {
        Self {
            output: Snapshot::empty(Direction::Output),
            capture: Snapshot::empty(Direction::Capture),
        }
    }
}

impl DeviceDirectory {
    /// Build both snapshots (subsystem init)
    pub fn build(hw: &dyn AudioHardware) -> Self {
        let mut directory = Self::default();
        directory.rebuild(hw, Direction::Output);
        directory.rebuild(hw, Direction::Capture);
        directory
    }

    pub fn snapshot(&self, direction: Direction) -> &Snapshot {
        match direction {
            Direction::Output => &self.output,
            Direction::Capture => &self.capture,
        }
    }

    fn snapshot_mut(&mut self, direction: Direction) -> &mut Snapshot {
        match direction {
            Direction::Output => &mut self.output,
            Direction::Capture => &mut self.capture,
        }
    }

    pub fn names(&self, direction: Direction) -> Vec<String> {
        self.snapshot(direction)
            .endpoints()
            .iter()
            .map(|endpoint| endpoint.name.clone())
            .collect()
    }

    pub fn get(&self, direction: Direction, index: usize) -> Option<&EndpointRecord> {
        self.snapshot(direction).get(index)
    }

    pub fn lookup_by_name(&self, direction: Direction, name: &str) -> Option<DeviceId> {
        self.snapshot(direction).lookup_by_name(name)
    }

    /// Re-enumerate one direction
    ///
    /// The previous snapshot is discarded first, so a failed enumeration
    /// leaves the directory empty rather than stale. Failures never surface.
    pub fn rebuild(&mut self, hw: &dyn AudioHardware, direction: Direction) -> &Snapshot {
        *self.snapshot_mut(direction) = Snapshot::empty(direction);

        let device_ids = match hw.device_ids() {
            Ok(ids) => ids,
            Err(e) => {
                log::warn!("[CoreAudio] {} device enumeration failed: {}", direction, e);
                return self.snapshot(direction);
            }
        };

        let mut endpoints = Vec::with_capacity(device_ids.len());
        for device_id in device_ids {
            if !Self::is_usable(hw, device_id, direction) {
                continue;
            }

            let name = match hw.device_name(device_id, direction) {
                Ok(raw) => match sanitize_name(&raw) {
                    Some(name) => name,
                    None => continue,
                },
                Err(e) => {
                    log::debug!("[CoreAudio] Skipping device {}: {}", device_id, e);
                    continue;
                }
            };

            log::debug!(
                "[CoreAudio] Found {} device #{}: '{}' (devid {})",
                direction,
                endpoints.len(),
                name,
                device_id
            );
            endpoints.push(EndpointRecord {
                id: device_id,
                name,
            });
        }

        let mut seen = HashSet::new();
        for endpoint in &endpoints {
            if !seen.insert(endpoint.name.as_str()) {
                log::warn!(
                    "[CoreAudio] Several {} devices are named '{}'; lookups pick the first",
                    direction,
                    endpoint.name
                );
            }
        }

        let snapshot = self.snapshot_mut(direction);
        snapshot.endpoints = endpoints;
        snapshot
    }

    /// Drop both snapshots (subsystem shutdown). Idempotent.
    pub fn teardown(&mut self) {
        *self = Self::default();
    }

    /// At least one buffer carrying a positive channel count
    fn is_usable(hw: &dyn AudioHardware, device_id: DeviceId, direction: Direction) -> bool {
        match hw.stream_configuration(device_id, direction) {
            Ok(buffers) => buffers.iter().any(|&channels| channels > 0),
            Err(_) => false,
        }
    }
}

/// Trim trailing spaces; reject empty names and names that can't be exported
/// as null-terminated text
fn sanitize_name(raw: &str) -> Option<String> {
    if raw.contains('\0') {
        return None;
    }
    let trimmed = raw.trim_end_matches(' ');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
