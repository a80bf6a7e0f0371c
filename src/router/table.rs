//! Route table: address pair to registered context.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::core::ConfigError;
use crate::link::LinkRoute;

/// Identifies one registered link on a router.
///
/// Ids are never reused, so a stale id simply stops resolving after
/// removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LinkId(usize);

impl LinkId {
    /// Numeric value, unique per router.
    pub fn index(self) -> usize {
        self.0
    }

    /// Id the `index`-th registration on a fresh router receives.
    pub(crate) fn from_index(index: usize) -> Self {
        Self(index)
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "link#{}", self.0)
    }
}

/// Contexts keyed by id, with a unique route index.
#[derive(Debug)]
pub(crate) struct RouteTable<T> {
    routes: HashMap<LinkRoute, LinkId>,
    entries: BTreeMap<LinkId, (LinkRoute, T)>,
    next_id: usize,
}

impl<T> Default for RouteTable<T> {
    fn default() -> Self {
        Self {
            routes: HashMap::new(),
            entries: BTreeMap::new(),
            next_id: 0,
        }
    }
}

impl<T> RouteTable<T> {
    /// Register `value` under `route`. Fails if the route is taken.
    pub(crate) fn insert(&mut self, route: LinkRoute, value: T) -> Result<LinkId, ConfigError> {
        if self.routes.contains_key(&route) {
            return Err(ConfigError::DuplicateRoute(route));
        }
        let id = LinkId(self.next_id);
        self.next_id += 1;
        self.routes.insert(route, id);
        self.entries.insert(id, (route, value));
        Ok(id)
    }

    pub(crate) fn lookup(&self, route: LinkRoute) -> Option<LinkId> {
        self.routes.get(&route).copied()
    }

    pub(crate) fn route_of(&self, id: LinkId) -> Option<LinkRoute> {
        self.entries.get(&id).map(|(route, _)| *route)
    }

    pub(crate) fn get(&self, id: LinkId) -> Option<&T> {
        self.entries.get(&id).map(|(_, value)| value)
    }

    pub(crate) fn get_mut(&mut self, id: LinkId) -> Option<&mut T> {
        self.entries.get_mut(&id).map(|(_, value)| value)
    }

    pub(crate) fn remove(&mut self, id: LinkId) -> Option<T> {
        let (route, value) = self.entries.remove(&id)?;
        self.routes.remove(&route);
        Some(value)
    }

    /// Registered ids in registration order.
    pub(crate) fn ids(&self) -> Vec<LinkId> {
        self.entries.keys().copied().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
