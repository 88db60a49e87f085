//! Client-side volume routing table
//!
//! Maps volume ids to the volume servers hosting them. Regular and
//! erasure-coded volumes are tracked in separate maps; lookups merge both
//! and order same-data-center servers first.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use volroute_common::{Error, FileId, Location, Result, VolumeId};

type LocationMap = HashMap<VolumeId, Vec<Location>>;

/// Volume id to location mapping for one leader session
#[derive(Debug, Default)]
pub struct RoutingTable {
    /// Preferred data center (empty = no preference)
    data_center: String,
    vid_locations: RwLock<LocationMap>,
    ec_vid_locations: RwLock<LocationMap>,
}

impl RoutingTable {
    /// Create an empty table preferring servers in `data_center`
    pub fn new(data_center: impl Into<String>) -> Self {
        Self {
            data_center: data_center.into(),
            vid_locations: RwLock::new(HashMap::new()),
            ec_vid_locations: RwLock::new(HashMap::new()),
        }
    }

    /// Preferred data center hint
    #[must_use]
    pub fn data_center(&self) -> &str {
        &self.data_center
    }

    /// Resolve a file id to download URLs, same data center first
    pub fn lookup_file_id(&self, file_id: &str) -> Result<Vec<String>> {
        let fid = FileId::parse(file_id)?;
        let locations = self.ordered_locations(fid.volume_id);
        if locations.is_empty() {
            return Err(Error::VolumeNotFound(fid.volume_id));
        }
        Ok(locations.iter().map(|loc| loc.file_url(file_id)).collect())
    }

    /// Resolve a volume id to the `host:port` of every server hosting it
    pub fn lookup_volume_server_urls(&self, vid: VolumeId) -> Result<Vec<String>> {
        let locations = self.ordered_locations(vid);
        if locations.is_empty() {
            return Err(Error::VolumeNotFound(vid));
        }
        Ok(locations.into_iter().map(|loc| loc.url).collect())
    }

    /// Locations of a regular volume, in insertion order
    #[must_use]
    pub fn get_locations(&self, vid: VolumeId) -> Option<Vec<Location>> {
        self.vid_locations.read().get(&vid).cloned()
    }

    /// Locations of an erasure-coded volume, in insertion order
    #[must_use]
    pub fn get_ec_locations(&self, vid: VolumeId) -> Option<Vec<Location>> {
        self.ec_vid_locations.read().get(&vid).cloned()
    }

    /// Record that `location` hosts volume `vid`. Returns false if already known.
    pub fn add_location(&self, vid: VolumeId, location: Location) -> bool {
        add_to(&mut self.vid_locations.write(), vid, location)
    }

    /// Forget that `location` hosts volume `vid`. Returns false if it was unknown.
    pub fn delete_location(&self, vid: VolumeId, location: &Location) -> bool {
        delete_from(&mut self.vid_locations.write(), vid, location)
    }

    pub fn add_ec_location(&self, vid: VolumeId, location: Location) -> bool {
        add_to(&mut self.ec_vid_locations.write(), vid, location)
    }

    pub fn delete_ec_location(&self, vid: VolumeId, location: &Location) -> bool {
        delete_from(&mut self.ec_vid_locations.write(), vid, location)
    }

    /// Number of regular volumes with at least one location
    #[must_use]
    pub fn volume_count(&self) -> usize {
        self.vid_locations.read().len()
    }

    /// Number of erasure-coded volumes with at least one location
    #[must_use]
    pub fn ec_volume_count(&self) -> usize {
        self.ec_vid_locations.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.volume_count() == 0 && self.ec_volume_count() == 0
    }

    /// All locations for `vid` across both maps, deduplicated, with
    /// same-data-center servers first. Order within each group is stable.
    fn ordered_locations(&self, vid: VolumeId) -> Vec<Location> {
        let mut locations: Vec<Location> = Vec::new();
        for map in [&self.vid_locations, &self.ec_vid_locations] {
            if let Some(found) = map.read().get(&vid) {
                for loc in found {
                    if !locations.contains(loc) {
                        locations.push(loc.clone());
                    }
                }
            }
        }

        if self.data_center.is_empty() {
            return locations;
        }

        let (mut same_dc, other): (Vec<_>, Vec<_>) = locations
            .into_iter()
            .partition(|loc| loc.data_center == self.data_center);
        same_dc.extend(other);
        same_dc
    }
}

fn add_to(map: &mut LocationMap, vid: VolumeId, location: Location) -> bool {
    let locations = map.entry(vid).or_default();
    if locations.contains(&location) {
        return false;
    }
    locations.push(location);
    true
}

fn delete_from(map: &mut LocationMap, vid: VolumeId, location: &Location) -> bool {
    let Some(locations) = map.get_mut(&vid) else {
        return false;
    };
    let Some(pos) = locations.iter().position(|loc| loc == location) else {
        return false;
    };
    locations.remove(pos);
    if locations.is_empty() {
        map.remove(&vid);
    }
    true
}

/// Swappable handle to the live routing table.
///
/// Readers take a cheap `Arc` snapshot; a new leader session swaps in a
/// fresh table without disturbing readers holding the old one.
#[derive(Debug)]
pub struct RoutingHandle {
    data_center: String,
    current: RwLock<Arc<RoutingTable>>,
}

impl RoutingHandle {
    pub fn new(data_center: impl Into<String>) -> Self {
        let data_center = data_center.into();
        Self {
            current: RwLock::new(Arc::new(RoutingTable::new(data_center.clone()))),
            data_center,
        }
    }

    /// Current table
    #[must_use]
    pub fn load(&self) -> Arc<RoutingTable> {
        Arc::clone(&self.current.read())
    }

    /// Replace the table with an empty one, discarding everything learned
    pub fn reset(&self) -> Arc<RoutingTable> {
        let fresh = Arc::new(RoutingTable::new(self.data_center.clone()));
        *self.current.write() = Arc::clone(&fresh);
        fresh
    }
}
