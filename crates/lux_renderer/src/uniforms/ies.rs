use std::sync::Arc;

use lux_core::Texture;

use super::TextureArray;

/// Angular resolution of a resampled IES profile (degrees of azimuth x elevation).
pub const IES_PROFILE_SIZE: (u32, u32) = (360, 180);

/// IES candela profiles, one layer per profile.
#[derive(Debug, Clone)]
pub struct IesProfilesTexture {
    pub array: TextureArray,
}

impl Default for IesProfilesTexture {
    fn default() -> Self {
        Self::new()
    }
}

impl IesProfilesTexture {
    pub fn new() -> Self {
        let (width, height) = IES_PROFILE_SIZE;
        Self {
            array: TextureArray::new("ies_profiles").with_size(width, height),
        }
    }

    pub fn count(&self) -> usize {
        self.array.count()
    }

    pub fn update_from(&mut self, profiles: &[Arc<Texture>]) {
        self.array.update_from(profiles);
    }
}
