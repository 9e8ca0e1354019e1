//! LwM2M node paths (`/object/instance/resource/resource-instance`)

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{Error, Result};

/// Largest id usable for objects, resources and resource instances
pub const MAX_ID: u32 = 65535;

/// Largest object instance id; 65535 is reserved
pub const MAX_OBJECT_INSTANCE_ID: u32 = 65534;

/// Path to an LwM2M node. Each level is only present when the one above is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Lwm2mPath {
    object_id: Option<u16>,
    object_instance_id: Option<u16>,
    resource_id: Option<u16>,
    resource_instance_id: Option<u16>,
}

impl Lwm2mPath {
    pub const ROOT: Lwm2mPath = Lwm2mPath {
        object_id: None,
        object_instance_id: None,
        resource_id: None,
        resource_instance_id: None,
    };

    pub fn object(object_id: u16) -> Self {
        Self {
            object_id: Some(object_id),
            ..Self::ROOT
        }
    }

    pub fn object_instance(object_id: u16, instance_id: u16) -> Result<Self> {
        validate_instance_id(instance_id as u32)?;
        Ok(Self {
            object_id: Some(object_id),
            object_instance_id: Some(instance_id),
            ..Self::ROOT
        })
    }

    pub fn resource(object_id: u16, instance_id: u16, resource_id: u16) -> Result<Self> {
        let mut path = Self::object_instance(object_id, instance_id)?;
        path.resource_id = Some(resource_id);
        Ok(path)
    }

    pub fn resource_instance(
        object_id: u16,
        instance_id: u16,
        resource_id: u16,
        resource_instance_id: u16,
    ) -> Result<Self> {
        let mut path = Self::resource(object_id, instance_id, resource_id)?;
        path.resource_instance_id = Some(resource_instance_id);
        Ok(path)
    }

    pub fn object_id(&self) -> Option<u16> {
        self.object_id
    }

    pub fn object_instance_id(&self) -> Option<u16> {
        self.object_instance_id
    }

    pub fn resource_id(&self) -> Option<u16> {
        self.resource_id
    }

    pub fn resource_instance_id(&self) -> Option<u16> {
        self.resource_instance_id
    }

    /// Number of ids in the path (0 for the root)
    pub fn depth(&self) -> usize {
        self.ids().len()
    }

    /// Ids from the object down
    pub fn ids(&self) -> Vec<u16> {
        [
            self.object_id,
            self.object_instance_id,
            self.resource_id,
            self.resource_instance_id,
        ]
        .into_iter()
        .map_while(|id| id)
        .collect()
    }

    pub fn is_root(&self) -> bool {
        self.depth() == 0
    }

    pub fn is_object(&self) -> bool {
        self.depth() == 1
    }

    pub fn is_object_instance(&self) -> bool {
        self.depth() == 2
    }

    pub fn is_resource(&self) -> bool {
        self.depth() == 3
    }

    pub fn is_resource_instance(&self) -> bool {
        self.depth() == 4
    }

    /// Whether `prefix` addresses this node or one of its ancestors
    pub fn starts_with(&self, prefix: &Lwm2mPath) -> bool {
        let own = self.ids();
        let other = prefix.ids();
        other.len() <= own.len() && own[..other.len()] == other[..]
    }

    /// Path one level deeper
    pub fn append(&self, id: u16) -> Result<Self> {
        let mut path = *self;
        match self.depth() {
            0 => path.object_id = Some(id),
            1 => {
                validate_instance_id(id as u32)?;
                path.object_instance_id = Some(id);
            }
            2 => path.resource_id = Some(id),
            3 => path.resource_instance_id = Some(id),
            _ => {
                return Err(Error::InvalidPath(format!(
                    "unable to append id {} to {}: resource instance is the deepest level",
                    id, self
                )))
            }
        }
        Ok(path)
    }

    /// Parent path, `None` for the root
    pub fn parent(&self) -> Option<Self> {
        let mut path = *self;
        if path.resource_instance_id.take().is_some()
            || path.resource_id.take().is_some()
            || path.object_instance_id.take().is_some()
            || path.object_id.take().is_some()
        {
            Some(path)
        } else {
            None
        }
    }

    pub fn to_object_path(&self) -> Option<Self> {
        self.truncate(1)
    }

    pub fn to_object_instance_path(&self) -> Option<Self> {
        self.truncate(2)
    }

    pub fn to_resource_path(&self) -> Option<Self> {
        self.truncate(3)
    }

    fn truncate(&self, depth: usize) -> Option<Self> {
        if self.depth() < depth {
            return None;
        }
        let ids = self.ids();
        let id = |i: usize| if i < depth { ids.get(i).copied() } else { None };
        Some(Self {
            object_id: id(0),
            object_instance_id: id(1),
            resource_id: id(2),
            resource_instance_id: id(3),
        })
    }
}

fn validate_instance_id(id: u32) -> Result<()> {
    if id > MAX_OBJECT_INSTANCE_ID {
        return Err(Error::InvalidPath(format!(
            "invalid object instance id {}, 65535 is reserved",
            id
        )));
    }
    Ok(())
}

/// Split a resource instance path into its resource path and instance id
pub fn split_resource_instance(path: &str) -> Result<(String, u16)> {
    let parsed: Lwm2mPath = path.parse()?;
    match (parsed.to_resource_path(), parsed.resource_instance_id) {
        (Some(resource), Some(instance)) => Ok((resource.to_string(), instance)),
        _ => Err(Error::InvalidPath(format!(
            "{} does not target a resource instance",
            path
        ))),
    }
}

impl FromStr for Lwm2mPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.strip_prefix('/').unwrap_or(s);
        let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);
        if trimmed.is_empty() {
            return Ok(Self::ROOT);
        }

        let segments: Vec<&str> = trimmed.split('/').collect();
        if segments.len() > 4 {
            return Err(Error::InvalidPath(format!("too many levels in {}", s)));
        }

        let mut path = Self::ROOT;
        for segment in segments {
            let id: u32 = segment.parse().map_err(|_| {
                Error::InvalidPath(format!("invalid element '{}' in {}", segment, s))
            })?;
            if id > MAX_ID {
                return Err(Error::InvalidPath(format!(
                    "invalid id {} in {}, it must be an unsigned 16-bit int",
                    id, s
                )));
            }
            path = path.append(id as u16)?;
        }
        Ok(path)
    }
}

impl fmt::Display for Lwm2mPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids = self.ids();
        if ids.is_empty() {
            return write!(f, "/");
        }
        for id in ids {
            write!(f, "/{}", id)?;
        }
        Ok(())
    }
}

impl Ord for Lwm2mPath {
    fn cmp(&self, other: &Self) -> Ordering {
        // Option orders None first, so parents sort before their children
        (
            self.object_id,
            self.object_instance_id,
            self.resource_id,
            self.resource_instance_id,
        )
            .cmp(&(
                other.object_id,
                other.object_instance_id,
                other.resource_id,
                other.resource_instance_id,
            ))
    }
}

impl PartialOrd for Lwm2mPath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Serialize for Lwm2mPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Lwm2mPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_levels() {
        let p: Lwm2mPath = "/3/0/11/1".parse().unwrap();
        assert!(p.is_resource_instance());
        assert_eq!(p.ids(), vec![3, 0, 11, 1]);
        assert_eq!(p.to_string(), "/3/0/11/1");

        assert!("3".parse::<Lwm2mPath>().unwrap().is_object());
        assert!("/3/0/".parse::<Lwm2mPath>().unwrap().is_object_instance());
        assert!("/".parse::<Lwm2mPath>().unwrap().is_root());
        assert!("".parse::<Lwm2mPath>().unwrap().is_root());
        assert_eq!(Lwm2mPath::ROOT.to_string(), "/");
    }

    #[test]
    fn test_parse_rejects_invalid() {
        assert!("/3/0/1/2/3".parse::<Lwm2mPath>().is_err());
        assert!("/3/a".parse::<Lwm2mPath>().is_err());
        assert!("/3//1".parse::<Lwm2mPath>().is_err());
        assert!("/65536".parse::<Lwm2mPath>().is_err());
        assert!("/3/65535".parse::<Lwm2mPath>().is_err());
        assert!("/3/65534/65535".parse::<Lwm2mPath>().is_ok());
    }

    #[test]
    fn test_navigation() {
        let p: Lwm2mPath = "/3/0/11".parse().unwrap();
        assert_eq!(p.parent().unwrap().to_string(), "/3/0");
        assert_eq!(p.to_object_path().unwrap().to_string(), "/3");
        assert_eq!(p.to_object_instance_path().unwrap().to_string(), "/3/0");
        assert!(p.to_object_path().unwrap().to_resource_path().is_none());
        assert_eq!(p.append(2).unwrap().to_string(), "/3/0/11/2");
        assert!(p.append(2).unwrap().append(1).is_err());
        assert_eq!(Lwm2mPath::object(1).parent(), Some(Lwm2mPath::ROOT));
        assert_eq!(Lwm2mPath::ROOT.parent(), None);
    }

    #[test]
    fn test_starts_with() {
        let p: Lwm2mPath = "/3/0/11".parse().unwrap();
        assert!(p.starts_with(&"/3/0".parse().unwrap()));
        assert!(p.starts_with(&Lwm2mPath::ROOT));
        assert!(p.starts_with(&p));
        assert!(!p.starts_with(&"/3/1".parse().unwrap()));
        assert!(!p.starts_with(&"/3/0/11/0".parse().unwrap()));
    }

    #[test]
    fn test_ordering_parents_first() {
        let mut paths: Vec<Lwm2mPath> = ["/3/0/1", "/1", "/3", "/3/0", "/1/0"]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();
        paths.sort();
        let rendered: Vec<String> = paths.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, vec!["/1", "/1/0", "/3", "/3/0", "/3/0/1"]);
    }

    #[test]
    fn test_split_resource_instance() {
        assert_eq!(
            split_resource_instance("/3/0/11/1").unwrap(),
            ("/3/0/11".to_string(), 1)
        );
        assert!(split_resource_instance("/3/0/11").is_err());
    }
}
