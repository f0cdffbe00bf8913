//! Emitters turn one processor into shader text and later feed its uniforms.
//!
//! Every processor class has one emitter type. An emitter instance is created
//! per processor when a program is built, writes its code once, and is kept
//! with the linked program so later draws only re-enter `set_data`. Fragment
//! emitters mirror their processor's children one to one through
//! [`EmitterNode`].

pub(crate) mod blend;
pub(crate) mod fragment;
pub(crate) mod geometry;
pub(crate) mod xfer;

use effects::{FragmentProcessor, GeometryProcessor, TransferProcessor};

use crate::builder::{ProgramBuilder, SamplerHandle, TransformedCoord};
use crate::error::BuildError;
use crate::pipeline::InputSource;
use crate::registry::EmitterRegistry;
use crate::uniform::ProgramDataManager;

/// What a fragment emitter sees while writing code.
///
/// `coords` and `samplers` cover the whole subtree rooted at `processor`, in
/// the same flattened pre-order as its transforms and textures.
pub struct EmitArgs<'a> {
    pub builder: &'a mut ProgramBuilder,
    pub processor: &'a FragmentProcessor,
    pub input: &'a str,
    pub output: &'a str,
    pub coords: &'a [TransformedCoord],
    pub samplers: &'a [SamplerHandle],
    children: &'a mut [EmitterNode],
}

impl<'a> EmitArgs<'a> {
    pub(crate) fn new(
        builder: &'a mut ProgramBuilder,
        processor: &'a FragmentProcessor,
        input: &'a str,
        output: &'a str,
        coords: &'a [TransformedCoord],
        samplers: &'a [SamplerHandle],
        children: &'a mut [EmitterNode],
    ) -> Self {
        assert_eq!(
            children.len(),
            processor.child_count(),
            "emitter children out of step with processor children"
        );
        Self {
            builder,
            processor,
            input,
            output,
            coords,
            samplers,
            children,
        }
    }

    /// Writes child `index`'s code, reading `input` and assigning `output`.
    ///
    /// The child only sees its own share of the coordinates and samplers, and
    /// every name it declares carries an extra `_c<index>` suffix.
    pub fn emit_child(&mut self, index: usize, input: &str, output: &str) {
        let slice = self.processor.child_slice(index);
        let coords =
            &self.coords[slice.first_transform..slice.first_transform + slice.transform_count];
        let samplers =
            &self.samplers[slice.first_texture..slice.first_texture + slice.texture_count];
        let processor = self.processor.child(index);
        let node = &mut self.children[index];

        self.builder.enter_child(index);
        self.builder.fragment().code_append("{\n");
        let mut args = EmitArgs::new(
            &mut *self.builder,
            processor,
            input,
            output,
            coords,
            samplers,
            &mut node.children,
        );
        node.emitter.emit_code(&mut args);
        self.builder.fragment().code_append("}\n");
        self.builder.exit_child();
    }

    /// Like [`Self::emit_child`], writing into a fresh `vec4` whose name is
    /// returned.
    pub fn emit_child_to_temp(&mut self, index: usize, input: &str) -> String {
        let temp = self.builder.name_variable(&format!("child{index}"));
        self.builder
            .fragment()
            .code_append(&format!("vec4 {temp};\n"));
        self.emit_child(index, input, &temp);
        temp
    }

    /// `vec2` expression for transformed coordinate `index`.
    pub fn coords_2d(&mut self, index: usize) -> String {
        let coord = &self.coords[index];
        self.builder.ensure_coords_2d(coord)
    }

    /// Texture read through sampler `index`.
    pub fn texture_lookup(&mut self, index: usize, coords: &str) -> String {
        self.builder
            .fragment()
            .texture_lookup(&self.samplers[index], coords)
    }
}

/// What the geometry emitter sees. It assigns both outputs.
pub struct GeometryEmitArgs<'a> {
    pub builder: &'a mut ProgramBuilder,
    pub processor: &'a GeometryProcessor,
    pub samplers: &'a [SamplerHandle],
    pub color_input: InputSource,
    pub coverage_input: InputSource,
    /// Fragment expression for a uniform or constant input color.
    pub input_color: &'a str,
    pub input_coverage: &'a str,
    pub output_color: &'a str,
    pub output_coverage: &'a str,
}

/// What the transfer emitter sees. It writes the final fragment color.
pub struct XferEmitArgs<'a> {
    pub builder: &'a mut ProgramBuilder,
    pub processor: &'a TransferProcessor,
    pub input_color: &'a str,
    pub input_coverage: &'a str,
    pub output: &'a str,
    /// Destination color variable, when the shader blends against it.
    pub dst_color: Option<&'a str>,
    pub hardware_advanced: bool,
}

pub trait FragmentEmitter {
    fn emit_code(&mut self, args: &mut EmitArgs<'_>);

    /// Uploads this processor's uniforms. Emitters skip values that are
    /// already current.
    fn set_data(&mut self, _dm: &mut ProgramDataManager<'_>, _processor: &FragmentProcessor) {}
}

pub trait GeometryEmitter {
    fn emit_code(&mut self, args: &mut GeometryEmitArgs<'_>);

    fn set_data(&mut self, _dm: &mut ProgramDataManager<'_>, _processor: &GeometryProcessor) {}
}

pub trait XferEmitter {
    fn emit_code(&mut self, args: &mut XferEmitArgs<'_>);

    fn set_data(&mut self, _dm: &mut ProgramDataManager<'_>, _processor: &TransferProcessor) {}
}

/// A fragment emitter and the emitters of its processor's children.
pub struct EmitterNode {
    pub(crate) emitter: Box<dyn FragmentEmitter>,
    pub(crate) children: Vec<EmitterNode>,
}

impl EmitterNode {
    pub(crate) fn create(
        processor: &FragmentProcessor,
        registry: &EmitterRegistry,
    ) -> Result<Self, BuildError> {
        let emitter = registry.create_fragment(processor)?;
        let children = processor
            .children()
            .iter()
            .map(|child| EmitterNode::create(child, registry))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { emitter, children })
    }

    /// Parent first, then children in order.
    pub(crate) fn set_data(&mut self, dm: &mut ProgramDataManager<'_>, processor: &FragmentProcessor) {
        self.emitter.set_data(dm, processor);
        for (child, processor) in self.children.iter_mut().zip(processor.children()) {
            child.set_data(dm, processor);
        }
    }
}
