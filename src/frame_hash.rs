use crate::pattern::CharacterData;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0001_0000_01b3;

/// Incremental FNV-1a over little-endian words.
#[derive(Debug, Clone, Copy)]
pub struct FrameHasher {
    hash: u64,
}

impl Default for FrameHasher {
    fn default() -> Self {
        Self {
            hash: FNV_OFFSET_BASIS,
        }
    }
}

impl FrameHasher {
    pub fn write(&mut self, bytes: &[u8]) {
        for byte in bytes {
            self.hash ^= u64::from(*byte);
            self.hash = self.hash.wrapping_mul(FNV_PRIME);
        }
    }

    pub fn write_u32(&mut self, value: u32) {
        self.write(&value.to_le_bytes());
    }

    pub fn write_f32(&mut self, value: f32) {
        self.write_u32(value.to_bits());
    }

    pub fn finish(self) -> u64 {
        self.hash
    }
}

/// Order-sensitive hash over every drawable property of a frame.
pub fn hash_characters(characters: &[CharacterData]) -> u64 {
    let mut hasher = FrameHasher::default();
    hasher.write_u32(characters.len() as u32);
    for character in characters {
        hasher.write_f32(character.x);
        hasher.write_f32(character.y);
        hasher.write_u32(u32::from(character.glyph));
        match character.color {
            Some(color) => {
                hasher.write(&[1]);
                for channel in color.as_array() {
                    hasher.write_f32(channel);
                }
            }
            None => hasher.write(&[0]),
        }
        hasher.write_f32(character.opacity);
        hasher.write_f32(character.scale);
        hasher.write_f32(character.rotation);
    }
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::{hash_characters, FrameHasher};
    use crate::color::ColorRgba;
    use crate::pattern::CharacterData;

    #[test]
    fn matches_reference_fnv_vectors() {
        assert_eq!(FrameHasher::default().finish(), 0xcbf2_9ce4_8422_2325);
        let mut hasher = FrameHasher::default();
        hasher.write(b"a");
        assert_eq!(hasher.finish(), 0xaf63_dc4c_8601_ec8c);
    }

    #[test]
    fn order_and_every_property_matter() {
        let a = CharacterData::new(0.0, 0.0, 'a');
        let b = CharacterData::new(10.0, 0.0, 'b');
        let base = hash_characters(&[a.clone(), b.clone()]);

        assert_eq!(base, hash_characters(&[a.clone(), b.clone()]));
        assert_ne!(base, hash_characters(&[b.clone(), a.clone()]));
        assert_ne!(
            base,
            hash_characters(&[a.clone().with_opacity(0.5), b.clone()])
        );
        assert_ne!(
            base,
            hash_characters(&[a.clone().with_color(ColorRgba::WHITE), b.clone()])
        );
        assert_ne!(
            base,
            hash_characters(&[a.clone().with_transform(1.0, 90.0), b.clone()])
        );
        assert_ne!(hash_characters(&[]), hash_characters(&[a]));
    }
}
