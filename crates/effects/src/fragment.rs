use crate::blend::BlendMode;
use crate::matrix::Matrix3;
use crate::texture::TextureAccess;
use crate::transform::CoordTransform;
use crate::{ClassId, Color};

/// How a constant color combines with the incoming color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputMode {
    /// Output the constant color as-is.
    Ignore,
    /// Multiply every channel by the input.
    ModulateRgba,
    /// Multiply by the input's alpha only.
    ModulateA,
}

/// Which channel of the displacement texture drives an axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelSelector {
    R,
    G,
    B,
    A,
}

impl ChannelSelector {
    pub fn swizzle_char(self) -> char {
        match self {
            ChannelSelector::R => 'r',
            ChannelSelector::G => 'g',
            ChannelSelector::B => 'b',
            ChannelSelector::A => 'a',
        }
    }
}

/// Behaviour of reads outside a texture domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DomainMode {
    /// Clamp coordinates into the domain.
    Clamp,
    /// Return transparent black outside the domain.
    Decal,
}

/// Kind-specific state of a fragment processor.
#[derive(Debug, Clone, PartialEq)]
pub enum FragmentKind {
    ConstColor {
        color: Color,
        mode: InputMode,
    },
    SimpleTexture,
    TextureDomain {
        /// left, top, right, bottom in normalized texture coordinates
        domain: [f32; 4],
        mode: DomainMode,
    },
    LinearGradient {
        start: Color,
        end: Color,
    },
    ColorMatrix {
        /// 4x5 row-major matrix; the fifth column is the bias.
        matrix: [f32; 20],
    },
    DisplacementMap {
        x_selector: ChannelSelector,
        y_selector: ChannelSelector,
        scale: [f32; 2],
    },
    Compose {
        mode: BlendMode,
    },
    Series,
}

impl FragmentKind {
    pub fn class_id(&self) -> ClassId {
        match self {
            FragmentKind::ConstColor { .. } => ClassId::CONST_COLOR,
            FragmentKind::SimpleTexture => ClassId::SIMPLE_TEXTURE,
            FragmentKind::TextureDomain { .. } => ClassId::TEXTURE_DOMAIN,
            FragmentKind::LinearGradient { .. } => ClassId::LINEAR_GRADIENT,
            FragmentKind::ColorMatrix { .. } => ClassId::COLOR_MATRIX,
            FragmentKind::DisplacementMap { .. } => ClassId::DISPLACEMENT_MAP,
            FragmentKind::Compose { .. } => ClassId::COMPOSE,
            FragmentKind::Series => ClassId::SERIES,
        }
    }
}

/// Where a child's share of its parent's flattened transforms and textures
/// lives, relative to the parent's first item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildSlice {
    pub first_transform: usize,
    pub transform_count: usize,
    pub first_texture: usize,
    pub texture_count: usize,
}

/// One color or coverage stage of a draw, possibly with children.
///
/// Transforms and textures are exposed flattened in pre-order: the node's own
/// items first, then every child's subtree in child order. Subtree totals are
/// computed once at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct FragmentProcessor {
    kind: FragmentKind,
    transforms: Vec<CoordTransform>,
    textures: Vec<TextureAccess>,
    children: Vec<FragmentProcessor>,
    total_transforms: usize,
    total_textures: usize,
}

impl FragmentProcessor {
    pub fn from_parts(
        kind: FragmentKind,
        transforms: Vec<CoordTransform>,
        textures: Vec<TextureAccess>,
        children: Vec<FragmentProcessor>,
    ) -> Self {
        let total_transforms =
            transforms.len() + children.iter().map(|c| c.num_transforms()).sum::<usize>();
        let total_textures =
            textures.len() + children.iter().map(|c| c.num_textures()).sum::<usize>();
        Self {
            kind,
            transforms,
            textures,
            children,
            total_transforms,
            total_textures,
        }
    }

    pub fn const_color(color: Color, mode: InputMode) -> Self {
        Self::from_parts(FragmentKind::ConstColor { color, mode }, vec![], vec![], vec![])
    }

    /// Samples `access` at local coordinates mapped through `matrix`,
    /// modulated by the input color.
    pub fn simple_texture(access: TextureAccess, matrix: Matrix3) -> Self {
        Self::simple_texture_with(access, CoordTransform::local(matrix))
    }

    pub fn simple_texture_with(access: TextureAccess, transform: CoordTransform) -> Self {
        Self::from_parts(
            FragmentKind::SimpleTexture,
            vec![transform],
            vec![access],
            vec![],
        )
    }

    pub fn texture_domain(
        access: TextureAccess,
        transform: CoordTransform,
        domain: [f32; 4],
        mode: DomainMode,
    ) -> Self {
        Self::from_parts(
            FragmentKind::TextureDomain { domain, mode },
            vec![transform],
            vec![access],
            vec![],
        )
    }

    /// Gradient along the x axis of the space `matrix` maps local
    /// coordinates into, from `start` at 0 to `end` at 1.
    pub fn linear_gradient(start: Color, end: Color, matrix: Matrix3) -> Self {
        Self::from_parts(
            FragmentKind::LinearGradient { start, end },
            vec![CoordTransform::local(matrix)],
            vec![],
            vec![],
        )
    }

    pub fn color_matrix(matrix: [f32; 20]) -> Self {
        Self::from_parts(FragmentKind::ColorMatrix { matrix }, vec![], vec![], vec![])
    }

    /// Offsets reads of `color` by channels of `displacement`.
    pub fn displacement_map(
        x_selector: ChannelSelector,
        y_selector: ChannelSelector,
        scale: [f32; 2],
        displacement: (TextureAccess, CoordTransform),
        color: (TextureAccess, CoordTransform),
    ) -> Self {
        Self::from_parts(
            FragmentKind::DisplacementMap {
                x_selector,
                y_selector,
                scale,
            },
            vec![displacement.1, color.1],
            vec![displacement.0, color.0],
            vec![],
        )
    }

    /// Blends the output of `src` over the output of `dst` using `mode`.
    pub fn compose(mode: BlendMode, src: FragmentProcessor, dst: FragmentProcessor) -> Self {
        Self::from_parts(FragmentKind::Compose { mode }, vec![], vec![], vec![src, dst])
    }

    /// Runs `children` in order, feeding each output into the next.
    ///
    /// Panics when `children` is empty.
    pub fn series(children: Vec<FragmentProcessor>) -> Self {
        assert!(!children.is_empty(), "a series needs at least one child");
        Self::from_parts(FragmentKind::Series, vec![], vec![], children)
    }

    pub fn kind(&self) -> &FragmentKind {
        &self.kind
    }

    pub fn class_id(&self) -> ClassId {
        self.kind.class_id()
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    pub fn child(&self, index: usize) -> &FragmentProcessor {
        &self.children[index]
    }

    pub fn children(&self) -> &[FragmentProcessor] {
        &self.children
    }

    pub fn own_transforms(&self) -> &[CoordTransform] {
        &self.transforms
    }

    pub fn own_textures(&self) -> &[TextureAccess] {
        &self.textures
    }

    /// Transforms in this subtree.
    pub fn num_transforms(&self) -> usize {
        self.total_transforms
    }

    /// Textures in this subtree.
    pub fn num_textures(&self) -> usize {
        self.total_textures
    }

    /// Flattened pre-order transform lookup.
    pub fn transform(&self, index: usize) -> &CoordTransform {
        if let Some(own) = self.transforms.get(index) {
            return own;
        }
        let mut rest = index - self.transforms.len();
        for child in &self.children {
            if rest < child.num_transforms() {
                return child.transform(rest);
            }
            rest -= child.num_transforms();
        }
        panic!(
            "transform index {index} out of range for subtree with {} transforms",
            self.total_transforms
        );
    }

    /// Flattened pre-order texture lookup.
    pub fn texture_access(&self, index: usize) -> &TextureAccess {
        if let Some(own) = self.textures.get(index) {
            return own;
        }
        let mut rest = index - self.textures.len();
        for child in &self.children {
            if rest < child.num_textures() {
                return child.texture_access(rest);
            }
            rest -= child.num_textures();
        }
        panic!(
            "texture index {index} out of range for subtree with {} textures",
            self.total_textures
        );
    }

    /// Locates child `index`'s items inside this node's flattened arrays.
    ///
    /// Works backward from the end of the arrays, subtracting the subtree
    /// counts of every later sibling. The node only stores its subtree totals,
    /// so its own share is never needed.
    pub fn child_slice(&self, index: usize) -> ChildSlice {
        assert!(
            index < self.children.len(),
            "child {index} out of range ({} children)",
            self.children.len()
        );
        let mut first_transform = self.num_transforms();
        let mut first_texture = self.num_textures();
        for child in self.children[index..].iter().rev() {
            first_transform -= child.num_transforms();
            first_texture -= child.num_textures();
        }
        let child = &self.children[index];
        ChildSlice {
            first_transform,
            transform_count: child.num_transforms(),
            first_texture,
            texture_count: child.num_textures(),
        }
    }

    /// Pre-order walk over this node and its descendants.
    pub fn preorder(&self) -> Preorder<'_> {
        Preorder { stack: vec![self] }
    }

    pub fn tree_size(&self) -> usize {
        1 + self.children.iter().map(|c| c.tree_size()).sum::<usize>()
    }

    /// Content equality: kind state, transform matrices and metadata, texture
    /// identities with sampler state and swizzles, and children recursively.
    pub fn is_equal(&self, other: &FragmentProcessor) -> bool {
        self == other
    }
}

pub struct Preorder<'a> {
    stack: Vec<&'a FragmentProcessor>,
}

impl<'a> Iterator for Preorder<'a> {
    type Item = &'a FragmentProcessor;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::texture::{PixelConfig, SamplerParams, TextureHandle};

    fn access(id: u32) -> TextureAccess {
        TextureAccess::new(
            TextureHandle::new(id, 64, 64, PixelConfig::Rgba8888),
            SamplerParams::default(),
        )
    }

    fn transform(tx: f32) -> CoordTransform {
        CoordTransform::local(Matrix3::translate(tx, 0.0))
    }

    fn scenario() -> FragmentProcessor {
        let child_a = FragmentProcessor::from_parts(
            FragmentKind::SimpleTexture,
            vec![transform(10.0)],
            vec![access(10)],
            vec![],
        );
        let child_b = FragmentProcessor::from_parts(
            FragmentKind::Series,
            vec![],
            vec![access(20), access(21)],
            vec![],
        );
        FragmentProcessor::from_parts(
            FragmentKind::Series,
            vec![transform(1.0), transform(2.0)],
            vec![access(1)],
            vec![child_a, child_b],
        )
    }

    #[test]
    fn totals_include_descendants() {
        let parent = scenario();
        // 2 + 1 + 0 transforms, 1 + 1 + 2 textures
        assert_eq!(parent.num_transforms(), 3);
        assert_eq!(parent.num_textures(), 4);
        for node in parent.preorder() {
            let own_t = node.own_transforms().len();
            let own_x = node.own_textures().len();
            let child_t: usize = node.children().iter().map(|c| c.num_transforms()).sum();
            let child_x: usize = node.children().iter().map(|c| c.num_textures()).sum();
            assert_eq!(node.num_transforms(), own_t + child_t);
            assert_eq!(node.num_textures(), own_x + child_x);
        }
    }

    #[test]
    fn flattened_order_is_preorder() {
        let parent = scenario();
        let ids: Vec<u32> = (0..parent.num_textures())
            .map(|i| parent.texture_access(i).texture.id.0)
            .collect();
        assert_eq!(ids, vec![1, 10, 20, 21]);
        assert_eq!(parent.transform(2).matrix, Matrix3::translate(10.0, 0.0));
    }

    #[test]
    fn backward_slice_finds_each_child() {
        let parent = scenario();
        let b = parent.child_slice(1);
        assert_eq!(
            b,
            ChildSlice {
                first_transform: 3,
                transform_count: 0,
                first_texture: 2,
                texture_count: 2,
            }
        );
        let ids: Vec<u32> = (b.first_texture..b.first_texture + b.texture_count)
            .map(|i| parent.texture_access(i).texture.id.0)
            .collect();
        assert_eq!(ids, vec![20, 21]);

        let a = parent.child_slice(0);
        assert_eq!((a.first_transform, a.transform_count), (2, 1));
        assert_eq!((a.first_texture, a.texture_count), (1, 1));
    }

    #[test]
    fn equality_tracks_effective_state() {
        let a = scenario();
        let b = scenario();
        assert!(a.is_equal(&b));

        let tex = access(5);
        let plain = FragmentProcessor::simple_texture(tex, Matrix3::IDENTITY);
        let swizzled = FragmentProcessor::simple_texture(
            tex.with_swizzle(crate::Swizzle::AAAA),
            Matrix3::IDENTITY,
        );
        assert!(!plain.is_equal(&swizzled));

        let moved = FragmentProcessor::simple_texture(tex, Matrix3::translate(1.0, 0.0));
        assert!(!plain.is_equal(&moved));

        let red = FragmentProcessor::const_color([1.0, 0.0, 0.0, 1.0], InputMode::Ignore);
        let modulated = FragmentProcessor::const_color([1.0, 0.0, 0.0, 1.0], InputMode::ModulateA);
        assert!(!red.is_equal(&modulated));
    }

    #[test]
    fn preorder_visits_parent_before_children() {
        let parent = scenario();
        let classes: Vec<ClassId> = parent.preorder().map(|p| p.class_id()).collect();
        assert_eq!(
            classes,
            vec![ClassId::SERIES, ClassId::SIMPLE_TEXTURE, ClassId::SERIES]
        );
        assert_eq!(parent.tree_size(), 3);
    }
}
