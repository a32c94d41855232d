// Wrapper types making it harder to accidentaly use the wrong underlying type.

use std::{
    borrow::Cow,
    fmt::{self, Display},
    str::FromStr,
};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A namespaced identifier such as `fastquartz:quartz_generator`.
///
/// Used for block types, items and anything else keyed by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier {
    /// The namespace, `minecraft` for vanilla content.
    pub namespace: Cow<'static, str>,
    /// The path inside the namespace.
    pub path: Cow<'static, str>,
}

impl Identifier {
    /// The namespace used when none is given.
    pub const VANILLA_NAMESPACE: &'static str = "minecraft";

    /// Creates an identifier in the vanilla namespace.
    #[must_use]
    pub fn vanilla(path: String) -> Self {
        Identifier {
            namespace: Cow::Borrowed(Self::VANILLA_NAMESPACE),
            path: Cow::Owned(path),
        }
    }

    /// Creates a vanilla identifier from a static path, usable in constants.
    #[must_use]
    pub const fn vanilla_static(path: &'static str) -> Self {
        Identifier {
            namespace: Cow::Borrowed(Self::VANILLA_NAMESPACE),
            path: Cow::Borrowed(path),
        }
    }

    /// Creates an identifier from static parts, usable in constants.
    #[must_use]
    pub const fn new_static(namespace: &'static str, path: &'static str) -> Self {
        Identifier {
            namespace: Cow::Borrowed(namespace),
            path: Cow::Borrowed(path),
        }
    }

    /// Returns true if `namespace_char` may appear in a namespace.
    #[must_use]
    pub fn valid_namespace_char(namespace_char: char) -> bool {
        namespace_char == '_'
            || namespace_char == '-'
            || namespace_char.is_ascii_lowercase()
            || namespace_char.is_ascii_digit()
            || namespace_char == '.'
    }

    /// Returns true if `path_char` may appear in a path.
    #[must_use]
    pub fn valid_path_char(path_char: char) -> bool {
        path_char == '_'
            || path_char == '-'
            || path_char.is_ascii_lowercase()
            || path_char.is_ascii_digit()
            || path_char == '/'
            || path_char == '.'
    }

    /// Validates a namespace.
    #[must_use]
    pub fn validate_namespace(namespace: &str) -> bool {
        !namespace.is_empty() && namespace.chars().all(Self::valid_namespace_char)
    }

    /// Validates a path.
    #[must_use]
    pub fn validate_path(path: &str) -> bool {
        !path.is_empty() && path.chars().all(Self::valid_path_char)
    }
}

impl Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.path)
    }
}

impl FromStr for Identifier {
    type Err = String;

    /// Parses `namespace:path`, or a bare `path` in the vanilla namespace.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (namespace, path) = match s.split_once(':') {
            Some((namespace, path)) => (namespace, path),
            None => (Self::VANILLA_NAMESPACE, s),
        };

        if path.contains(':') {
            return Err(format!("Invalid identifier: {s}"));
        }
        if !Identifier::validate_namespace(namespace) {
            return Err(format!("Invalid namespace: {namespace}"));
        }
        if !Identifier::validate_path(path) {
            return Err(format!("Invalid path: {path}"));
        }

        Ok(Identifier {
            namespace: Cow::Owned(namespace.to_string()),
            path: Cow::Owned(path.to_string()),
        })
    }
}

impl Serialize for Identifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Identifier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A dimension (world) identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct DimensionId(pub u16);

impl DimensionId {
    /// The overworld.
    pub const OVERWORLD: Self = Self(0);
    /// The nether.
    pub const NETHER: Self = Self(1);
    /// The end.
    pub const END: Self = Self(2);
}

impl Display for DimensionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::OVERWORLD => f.write_str("overworld"),
            Self::NETHER => f.write_str("the_nether"),
            Self::END => f.write_str("the_end"),
            Self(id) => write!(f, "dim{id}"),
        }
    }
}

/// A block position inside one dimension.
///
/// Ordering is lexicographic over `(x, y, z)`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct BlockPos {
    /// X coordinate.
    pub x: i32,
    /// Y coordinate.
    pub y: i32,
    /// Z coordinate.
    pub z: i32,
}

impl BlockPos {
    /// Creates a new block position.
    #[must_use]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Returns this position moved by the given deltas.
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self {
            x: self.x.wrapping_add(dx),
            y: self.y.wrapping_add(dy),
            z: self.z.wrapping_add(dz),
        }
    }

    /// Returns the chunk containing this position.
    #[must_use]
    pub const fn chunk(self) -> ChunkPos {
        ChunkPos::new(self.x >> 4, self.z >> 4)
    }
}

impl Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// A relative offset between two block positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct BlockOffset {
    /// X delta.
    pub dx: i32,
    /// Y delta.
    pub dy: i32,
    /// Z delta.
    pub dz: i32,
}

impl BlockOffset {
    /// No offset, the position itself.
    pub const ZERO: Self = Self::new(0, 0, 0);
    /// One block up.
    pub const UP: Self = Self::new(0, 1, 0);
    /// One block down.
    pub const DOWN: Self = Self::new(0, -1, 0);

    /// Creates a new offset.
    #[must_use]
    pub const fn new(dx: i32, dy: i32, dz: i32) -> Self {
        Self { dx, dy, dz }
    }
}

/// A chunk position (16x16 column of blocks).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkPos {
    /// Chunk X coordinate.
    pub x: i32,
    /// Chunk Z coordinate.
    pub z: i32,
}

impl ChunkPos {
    /// Creates a new chunk position.
    #[must_use]
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }
}

/// A block position qualified by its dimension.
///
/// This is the key for everything that tracks automation sites. Ordering is
/// by dimension first, then by block position.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct Position {
    /// The dimension the block lives in.
    #[serde(default)]
    pub dimension: DimensionId,
    /// The block position.
    #[serde(flatten)]
    pub pos: BlockPos,
}

impl Position {
    /// Creates a position in the given dimension.
    #[must_use]
    pub const fn new(dimension: DimensionId, x: i32, y: i32, z: i32) -> Self {
        Self {
            dimension,
            pos: BlockPos::new(x, y, z),
        }
    }

    /// Creates a position in the overworld.
    #[must_use]
    pub const fn overworld(x: i32, y: i32, z: i32) -> Self {
        Self::new(DimensionId::OVERWORLD, x, y, z)
    }

    /// Returns this position moved by `offset`, staying in the same dimension.
    #[must_use]
    pub const fn offset(self, offset: BlockOffset) -> Self {
        Self {
            dimension: self.dimension,
            pos: self.pos.offset(offset.dx, offset.dy, offset.dz),
        }
    }

    /// Returns the chunk containing this position.
    #[must_use]
    pub const fn chunk(self) -> ChunkPos {
        self.pos.chunk()
    }
}

impl Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.dimension, self.pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_parse() {
        let id: Identifier = "fastquartz:quartz_generator".parse().expect("valid id");
        assert_eq!(id.namespace, "fastquartz");
        assert_eq!(id.path, "quartz_generator");
        assert_eq!(id.to_string(), "fastquartz:quartz_generator");

        let bare: Identifier = "stone".parse().expect("bare path");
        assert_eq!(bare, Identifier::vanilla_static("stone"));

        assert!("Bad:Name".parse::<Identifier>().is_err());
        assert!("a:b:c".parse::<Identifier>().is_err());
        assert!(":stone".parse::<Identifier>().is_err());
    }

    #[test]
    fn test_identifier_serde_as_string() {
        let id = Identifier::new_static("fastquartz", "quarry");
        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, "\"fastquartz:quarry\"");
        let back: Identifier = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, id);
    }

    #[test]
    fn test_position_ordering() {
        let a = Position::overworld(0, 0, 0);
        let b = Position::overworld(1, 0, 0);
        let c = Position::overworld(0, 5, 0);
        let d = Position::new(DimensionId::NETHER, -100, 0, 0);

        let mut positions = vec![d, b, c, a];
        positions.sort();
        assert_eq!(positions, vec![a, c, b, d]);
    }

    #[test]
    fn test_chunk_of_negative_position() {
        let pos = BlockPos::new(-1, 64, 17);
        assert_eq!(pos.chunk(), ChunkPos::new(-1, 1));
    }

    #[test]
    fn test_position_json_is_flat() {
        let pos = Position::overworld(3, -2, 7);
        let json = serde_json::to_string(&pos).expect("serialize");
        assert_eq!(json, r#"{"dimension":0,"x":3,"y":-2,"z":7}"#);

        let without_dimension: Position =
            serde_json::from_str(r#"{"x":3,"y":-2,"z":7}"#).expect("deserialize");
        assert_eq!(without_dimension, pos);
    }
}
