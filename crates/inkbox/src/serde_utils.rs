//! Serde helpers for glam types.
//!
//! glam is built without its `serde` feature, so colour and position fields
//! go through these proxies: `#[serde(with = "crate::serde_utils::vec4_serde")]`.

/// `Vec4` as `{ "x", "y", "z", "w" }`.
pub mod vec4_serde {
    use glam::Vec4;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    struct Vec4Repr {
        x: f32,
        y: f32,
        z: f32,
        w: f32,
    }

    pub fn serialize<S>(v: &Vec4, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        Vec4Repr {
            x: v.x,
            y: v.y,
            z: v.z,
            w: v.w,
        }
        .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec4, D::Error>
    where
        D: Deserializer<'de>,
    {
        let repr = Vec4Repr::deserialize(deserializer)?;
        Ok(Vec4::new(repr.x, repr.y, repr.z, repr.w))
    }
}

/// `Vec3` as `{ "x", "y", "z" }`.
pub mod vec3_serde {
    use glam::Vec3;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    struct Vec3Repr {
        x: f32,
        y: f32,
        z: f32,
    }

    pub fn serialize<S>(v: &Vec3, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        Vec3Repr {
            x: v.x,
            y: v.y,
            z: v.z,
        }
        .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec3, D::Error>
    where
        D: Deserializer<'de>,
    {
        let repr = Vec3Repr::deserialize(deserializer)?;
        Ok(Vec3::new(repr.x, repr.y, repr.z))
    }
}
