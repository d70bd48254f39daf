/// Material kind carried by every mesh fragment.
///
/// The assembler switches on this tag for color assignment only; placement
/// parameters live with the processors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Material {
    Base,
    Road,
    Bridge,
    Building,
    Water,
    Green,
    Park,
    Poi,
}

impl Material {
    /// Default RGB for fragments that were not explicitly colored.
    pub fn default_color(self) -> [u8; 3] {
        match self {
            Material::Base => [120, 110, 100],
            // Bridges share the road material unless overridden.
            Material::Road | Material::Bridge => [30, 30, 30],
            Material::Building => [180, 180, 180],
            Material::Water => [0, 100, 255],
            Material::Green | Material::Park => [90, 140, 80],
            Material::Poi => [220, 180, 60],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Material::Base => "base",
            Material::Road => "road",
            Material::Bridge => "bridge",
            Material::Building => "building",
            Material::Water => "water",
            Material::Green => "green",
            Material::Park => "park",
            Material::Poi => "poi",
        }
    }
}
