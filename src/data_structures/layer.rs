use bitflags::bitflags;

bitflags! {
    /// Render layers a scene object belongs to and a camera can see.
    ///
    /// Layers are plain bits: renderers are bucketed by their object's full
    /// layer value and buckets are drawn in ascending numeric order.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct Layers: u32 {
        const DEFAULT = 1;
        const VFX = 1 << 1;
        const TRANSPARENT = 1 << 2;
        const WATER = 1 << 3;
        const ALL = u32::MAX;
    }
}

impl Default for Layers {
    fn default() -> Self {
        Layers::DEFAULT
    }
}
