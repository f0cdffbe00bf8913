use std::collections::HashSet;

use codegen::backend::BackendCall;
use codegen::pipeline::DrawAnalysis;
use codegen::{
    builtin_registry, Caps, DrawKind, DrawPipeline, DstCopy, ProgramBuilder, ProgramCache,
    ProgramKey, RecordingBackend, RenderTarget,
};
use effects::{
    BlendMode, ChannelSelector, ClassId, CoordTransform, DomainMode, FragmentProcessor,
    GeometryProcessor, InputMode, Matrix3, PixelConfig, SamplerParams, SurfaceOrigin, Swizzle,
    TextureAccess, TextureHandle, TransferProcessor, VertexFlags,
};
use rand::prelude::*;

const SWIZZLES: [&str; 4] = ["rgba", "bgra", "aaaa", "rrra"];
const CHANNELS: [ChannelSelector; 4] = [
    ChannelSelector::R,
    ChannelSelector::G,
    ChannelSelector::B,
    ChannelSelector::A,
];
const XFER_MODES: [BlendMode; 4] = [
    BlendMode::SrcOver,
    BlendMode::Screen,
    BlendMode::Overlay,
    BlendMode::Multiply,
];
const COMPOSE_MODES: [BlendMode; 5] = [
    BlendMode::SrcOver,
    BlendMode::Modulate,
    BlendMode::Screen,
    BlendMode::Overlay,
    BlendMode::Hue,
];

fn caps_profiles() -> [Caps; 3] {
    let roomy = |caps: Caps| Caps {
        max_varying_vectors: 256,
        ..caps
    };
    [
        roomy(Caps::desktop_gl()),
        roomy(Caps::gles2()),
        roomy(Caps::gles3()),
    ]
}

fn color(values: &mut StdRng) -> [f32; 4] {
    [values.gen(), values.gen(), values.gen(), values.gen()]
}

/// Scale plus translation, never perspective, so the key cannot change.
fn affine(values: &mut StdRng) -> Matrix3 {
    Matrix3::from_row_major([
        values.gen_range(0.5..2.0),
        0.0,
        values.gen_range(-10.0..10.0),
        0.0,
        values.gen_range(0.5..2.0),
        values.gen_range(-10.0..10.0),
        0.0,
        0.0,
        1.0,
    ])
}

fn texture(shape: &mut StdRng, values: &mut StdRng) -> (TextureAccess, CoordTransform) {
    let config = if shape.gen_bool(0.3) {
        PixelConfig::Alpha8
    } else {
        PixelConfig::Rgba8888
    };
    let handle = TextureHandle::new(
        values.gen_range(1..1000),
        values.gen_range(1..512),
        values.gen_range(1..512),
        config,
    );
    let swizzle = Swizzle::parse(SWIZZLES[shape.gen_range(0..SWIZZLES.len())]).unwrap();
    let access = TextureAccess::new(handle, SamplerParams::default()).with_swizzle(swizzle);
    let transform = if shape.gen_bool(0.5) {
        CoordTransform::local(affine(values))
    } else {
        CoordTransform::device(affine(values))
    };
    (access, transform)
}

/// `affine` with a bottom row that is never trivial, so perspective is
/// decided by the caller's shape alone.
fn projective(values: &mut StdRng) -> Matrix3 {
    affine(values).concat(&Matrix3::perspective(
        values.gen_range(0.001..0.01),
        values.gen_range(0.001..0.01),
    ))
}

fn maybe_projective(shape: &mut StdRng, values: &mut StdRng) -> Matrix3 {
    if shape.gen_bool(0.25) {
        projective(values)
    } else {
        affine(values)
    }
}

fn origin(shape: &mut StdRng) -> SurfaceOrigin {
    if shape.gen_bool(0.5) {
        SurfaceOrigin::TopLeft
    } else {
        SurfaceOrigin::BottomLeft
    }
}

/// `shape` decides everything that reaches the key; `values` only decides
/// uniform values and texture identities.
fn random_tree(shape: &mut StdRng, values: &mut StdRng, depth: u32) -> FragmentProcessor {
    let leaf = depth == 0 || shape.gen_bool(0.35);
    let pick = if leaf {
        shape.gen_range(0..6)
    } else {
        shape.gen_range(6..8)
    };
    match pick {
        0 => {
            let mode = [InputMode::Ignore, InputMode::ModulateRgba, InputMode::ModulateA]
                [shape.gen_range(0..3)];
            FragmentProcessor::const_color(color(values), mode)
        }
        1 => {
            let (access, transform) = texture(shape, values);
            FragmentProcessor::simple_texture_with(access, transform)
        }
        2 => FragmentProcessor::linear_gradient(color(values), color(values), affine(values)),
        3 => {
            let mut matrix = [0.0; 20];
            for v in &mut matrix {
                *v = values.gen_range(-1.0..1.0);
            }
            FragmentProcessor::color_matrix(matrix)
        }
        4 => {
            let (access, transform) = texture(shape, values);
            let mode = if shape.gen_bool(0.5) {
                DomainMode::Clamp
            } else {
                DomainMode::Decal
            };
            let left = values.gen_range(0.0..0.4);
            let top = values.gen_range(0.0..0.4);
            let domain = [left, top, left + values.gen_range(0.1..0.6), top + 0.5];
            FragmentProcessor::texture_domain(access, transform, domain, mode)
        }
        5 => {
            let x = CHANNELS[shape.gen_range(0..CHANNELS.len())];
            let y = CHANNELS[shape.gen_range(0..CHANNELS.len())];
            let scale = [values.gen_range(-8.0..8.0), values.gen_range(-8.0..8.0)];
            let displacement = texture(shape, values);
            let color = texture(shape, values);
            FragmentProcessor::displacement_map(x, y, scale, displacement, color)
        }
        6 => {
            let mode = COMPOSE_MODES[shape.gen_range(0..COMPOSE_MODES.len())];
            let src = random_tree(shape, values, depth - 1);
            let dst = random_tree(shape, values, depth - 1);
            FragmentProcessor::compose(mode, src, dst)
        }
        _ => {
            let count = shape.gen_range(1..=3);
            let children = (0..count)
                .map(|_| random_tree(shape, values, depth - 1))
                .collect();
            FragmentProcessor::series(children)
        }
    }
}

fn random_pipeline(shape_seed: u64, value_seed: u64) -> DrawPipeline {
    let mut shape = StdRng::seed_from_u64(shape_seed);
    let mut values = StdRng::seed_from_u64(value_seed);

    let view = maybe_projective(&mut shape, &mut values);
    let gp = if shape.gen_bool(0.2) {
        let (atlas, _) = texture(&mut shape, &mut values);
        GeometryProcessor::distance_field(atlas, shape.gen_bool(0.5), shape.gen_bool(0.5), view)
    } else {
        let flags = VertexFlags {
            local_coords: shape.gen_bool(0.5),
            color: false,
            coverage: false,
        };
        GeometryProcessor::default_geometry(flags, view)
    };
    let gp = gp.with_local_matrix(maybe_projective(&mut shape, &mut values));

    let target = RenderTarget::new(values.gen_range(16..512), values.gen_range(16..512))
        .with_origin(origin(&mut shape));
    let xfer = XFER_MODES[shape.gen_range(0..XFER_MODES.len())];
    let mut pipeline = DrawPipeline::new(gp, target)
        .with_xfer(TransferProcessor::for_mode(xfer))
        .with_color(color(&mut values));
    // Custom modes on desktop read the destination through a copy.
    let custom = matches!(xfer, BlendMode::Overlay | BlendMode::Multiply);
    if custom || shape.gen_bool(0.3) {
        let texture = TextureHandle::new(
            values.gen_range(1000..2000),
            values.gen_range(16..512),
            values.gen_range(16..512),
            PixelConfig::Rgba8888,
        )
        .with_origin(origin(&mut shape));
        pipeline = pipeline.with_dst_copy(DstCopy {
            texture,
            offset: [values.gen_range(0.0..64.0), values.gen_range(0.0..64.0)],
        });
    }

    for _ in 0..shape.gen_range(1..=2) {
        pipeline = pipeline.with_color_stage(random_tree(&mut shape, &mut values, 3));
    }
    if shape.gen_bool(0.5) {
        pipeline = pipeline.with_coverage_stage(random_tree(&mut shape, &mut values, 2));
    }
    pipeline
}

#[test]
fn uniform_values_never_change_key_or_code() {
    for caps in caps_profiles() {
        for seed in 0..40 {
            let a = random_pipeline(seed, 1);
            let b = random_pipeline(seed, 2);
            let key_a = ProgramKey::build(&a, DrawKind::Triangles, &caps, builtin_registry()).unwrap();
            let key_b = ProgramKey::build(&b, DrawKind::Triangles, &caps, builtin_registry()).unwrap();
            assert_eq!(key_a, key_b, "seed {seed}");

            let gen_a = ProgramBuilder::build(&a, DrawKind::Triangles, &caps, builtin_registry()).unwrap();
            let gen_b = ProgramBuilder::build(&b, DrawKind::Triangles, &caps, builtin_registry()).unwrap();
            assert_eq!(gen_a.vertex, gen_b.vertex, "seed {seed}");
            assert_eq!(gen_a.fragment, gen_b.fragment, "seed {seed}");
        }
    }
}

#[test]
fn equal_keys_imply_equal_code() {
    let caps = caps_profiles()[1];
    let mut seen: Vec<(ProgramKey, String)> = Vec::new();
    for seed in 0..120 {
        let p = random_pipeline(seed % 60, seed);
        let key = ProgramKey::build(&p, DrawKind::Triangles, &caps, builtin_registry()).unwrap();
        let generated = ProgramBuilder::build(&p, DrawKind::Triangles, &caps, builtin_registry()).unwrap();
        let source = format!("{}{}", generated.vertex, generated.fragment);
        if let Some((_, previous)) = seen.iter().find(|(k, _)| *k == key) {
            assert_eq!(previous, &source, "seed {seed}");
        } else {
            seen.push((key, source));
        }
    }
}

#[test]
fn declared_names_are_unique() {
    for caps in caps_profiles() {
        for seed in 0..40 {
            let p = random_pipeline(seed, seed);
            let generated = ProgramBuilder::build(&p, DrawKind::Triangles, &caps, builtin_registry()).unwrap();
            let mut names = HashSet::new();
            for uniform in &generated.uniforms {
                assert!(
                    names.insert(uniform.var.name.clone()),
                    "seed {seed}: {} declared twice",
                    uniform.var.name
                );
            }
        }
    }
}

#[test]
fn nested_siblings_get_distinct_names() {
    let leaf = || FragmentProcessor::const_color([1.0, 0.0, 0.0, 1.0], InputMode::ModulateRgba);
    let nested = FragmentProcessor::series(vec![
        FragmentProcessor::series(vec![leaf(), leaf()]),
        FragmentProcessor::series(vec![leaf(), leaf()]),
    ]);
    let p = DrawPipeline::new(
        GeometryProcessor::default_geometry(VertexFlags::default(), Matrix3::IDENTITY),
        RenderTarget::new(8, 8),
    )
    .with_color_stage(nested);
    let generated =
        ProgramBuilder::build(&p, DrawKind::Triangles, &Caps::default(), builtin_registry()).unwrap();

    for path in ["_c0_c0", "_c0_c1", "_c1_c0", "_c1_c1"] {
        let name = format!("uColor_Stage1{path}");
        assert!(
            generated.uniforms.iter().any(|u| u.var.name == name),
            "{name} missing"
        );
        assert!(generated.fragment.contains(&name));
    }
}

#[test]
fn texture_units_cover_a_contiguous_range() {
    for caps in caps_profiles() {
        for seed in 0..30 {
            let p = random_pipeline(seed, seed + 100);
            let reads_copy = DrawAnalysis::new(&p, &caps).unwrap().dst_read.uses_copy();
            let expected = p.geometry.textures().len()
                + p.fragment_stages()
                    .map(FragmentProcessor::num_textures)
                    .sum::<usize>()
                + usize::from(reads_copy);

            let mut backend = RecordingBackend::new();
            let mut cache = ProgramCache::new(caps, 4);
            let program = cache.prepare_draw(&p, DrawKind::Triangles, &mut backend).unwrap();
            assert_eq!(program.sampler_count(), expected, "seed {seed}");

            let units = backend
                .calls()
                .iter()
                .filter_map(|call| match call {
                    BackendCall::BindTexture { unit, .. } => Some(*unit as usize),
                    _ => None,
                })
                .collect::<Vec<_>>();
            assert_eq!(units, (0..expected).collect::<Vec<_>>(), "seed {seed}");
        }
    }
}

#[test]
fn generated_pipelines_reach_every_processor_class() {
    let desktop = caps_profiles()[0];
    let mut classes = HashSet::new();
    let (mut view_perspective, mut local_perspective, mut dst_copies) = (false, false, false);
    for seed in 0..60 {
        let p = random_pipeline(seed, seed);
        classes.insert(p.geometry.class_id());
        classes.insert(p.xfer.class_id());
        for fp in p.fragment_stages().flat_map(FragmentProcessor::preorder) {
            classes.insert(fp.class_id());
        }
        view_perspective |= p.geometry.view_matrix().has_perspective();
        local_perspective |= p.geometry.coord_change_matrix().has_perspective();
        dst_copies |= DrawAnalysis::new(&p, &desktop)
            .unwrap()
            .dst_read
            .uses_copy();
    }
    for class in [
        ClassId::CONST_COLOR,
        ClassId::SIMPLE_TEXTURE,
        ClassId::TEXTURE_DOMAIN,
        ClassId::LINEAR_GRADIENT,
        ClassId::COLOR_MATRIX,
        ClassId::DISPLACEMENT_MAP,
        ClassId::COMPOSE,
        ClassId::SERIES,
        ClassId::DEFAULT_GEOMETRY,
        ClassId::DISTANCE_FIELD,
        ClassId::PORTER_DUFF,
        ClassId::CUSTOM_XFER,
    ] {
        assert!(classes.contains(&class), "{class:?} never generated");
    }
    assert!(view_perspective && local_perspective && dst_copies);
}

#[test]
fn varyings_gain_a_component_exactly_when_transforms_need_perspective() {
    for caps in caps_profiles() {
        for seed in 0..40 {
            let p = random_pipeline(seed, seed + 7);
            let generated =
                ProgramBuilder::build(&p, DrawKind::Triangles, &caps, builtin_registry()).unwrap();
            let coord_change = p.geometry.coord_change_matrix();
            for (stage, fp) in p.fragment_stages().enumerate() {
                for i in 0..fp.num_transforms() {
                    let name = format!("vMatrixCoord_{i}_Stage{}", stage + 1);
                    let (wide, narrow) = (format!("vec3 {name};"), format!("vec2 {name};"));
                    if fp.transform(i).needs_perspective(&coord_change) {
                        assert!(generated.vertex.contains(&wide), "seed {seed}: {name}");
                        assert!(!generated.vertex.contains(&narrow), "seed {seed}: {name}");
                    } else {
                        assert!(generated.vertex.contains(&narrow), "seed {seed}: {name}");
                        assert!(!generated.vertex.contains(&wide), "seed {seed}: {name}");
                    }
                }
            }
            let pos3 = generated.vertex.contains("vec3 pos3 =");
            assert_eq!(pos3, p.geometry.view_matrix().has_perspective(), "seed {seed}");
        }
    }
}

#[test]
fn swizzle_changes_key_only_when_shaders_swizzle() {
    let with = |swizzle: &str| {
        let access = TextureAccess::new(
            TextureHandle::new(1, 16, 16, PixelConfig::Rgba8888),
            SamplerParams::default(),
        )
        .with_swizzle(Swizzle::parse(swizzle).unwrap());
        DrawPipeline::new(
            GeometryProcessor::default_geometry(VertexFlags::default(), Matrix3::IDENTITY),
            RenderTarget::new(16, 16),
        )
        .with_color_stage(FragmentProcessor::simple_texture(access, Matrix3::IDENTITY))
    };
    let key = |p: &DrawPipeline, caps: &Caps| {
        ProgramKey::build(p, DrawKind::Triangles, caps, builtin_registry()).unwrap()
    };

    let (rgba, bgra) = (with("rgba"), with("bgra"));
    assert_ne!(key(&rgba, &Caps::gles2()), key(&bgra, &Caps::gles2()));
    assert_eq!(key(&rgba, &Caps::desktop_gl()), key(&bgra, &Caps::desktop_gl()));
}
