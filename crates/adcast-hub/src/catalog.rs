use std::sync::Arc;

use adcast_core::Advertisement;
use rand::seq::SliceRandom;
use rand::{Rng, RngCore};

/// Source of ads for the ticker. Implementations hold no mutable state.
pub trait AdCatalog: Send + Sync {
    /// Every ad currently on offer. Finite, and safe to call repeatedly.
    fn all(&self) -> Vec<Advertisement>;

    /// Pick one ad uniformly at random, or `None` for an empty catalog.
    fn pick(&self, rng: &mut dyn RngCore) -> Option<Advertisement> {
        self.all().choose(rng).cloned()
    }
}

/// Fixed list of ads, shared cheaply between the ticker and HTTP handlers.
#[derive(Clone, Debug)]
pub struct StaticCatalog {
    ads: Arc<[Advertisement]>,
}

impl StaticCatalog {
    pub fn new(ads: Vec<Advertisement>) -> Self {
        Self { ads: ads.into() }
    }

    /// The two launch campaigns.
    pub fn builtin() -> Self {
        Self::new(vec![
            Advertisement::new(
                1,
                "https://scontent.fknu2-1.fna.fbcdn.net/v/t39.30808-6/476005818_922314306781136_6981070312990821632_n.jpg",
                "https://www.zeptonow.com/",
            ),
            Advertisement::new(
                2,
                "https://www.analyticssteps.com/backend/media/thumbnail/1890055/4828382_1669140152_BlinkitArtboard%201.jpg",
                "https://www.blinkit.com/",
            ),
        ])
    }

    /// Use the configured ads, or [`StaticCatalog::builtin`] if none are configured.
    pub fn from_configured(ads: Vec<Advertisement>) -> Self {
        if ads.is_empty() {
            Self::builtin()
        } else {
            Self::new(ads)
        }
    }

    pub fn as_slice(&self) -> &[Advertisement] {
        &self.ads
    }
}

impl AdCatalog for StaticCatalog {
    fn all(&self) -> Vec<Advertisement> {
        self.ads.to_vec()
    }

    fn pick(&self, rng: &mut dyn RngCore) -> Option<Advertisement> {
        self.ads.choose(rng).cloned()
    }
}

/// The catalog from a random starting index to its end. Never empty unless
/// the catalog is.
pub fn random_tail<R: Rng + ?Sized>(ads: &[Advertisement], rng: &mut R) -> Vec<Advertisement> {
    if ads.is_empty() {
        return Vec::new();
    }
    let start = rng.gen_range(0..ads.len());
    ads[start..].to_vec()
}
