//! Per-family descriptor decoding.
//!
//! Each family has one decoder; [`resolve_defines`] dispatches through a table
//! indexed by [`ShaderFamily::index`]. Bits a decoder does not recognise
//! produce no symbols.

use kiln_common::{ShaderFamily, VariantDescriptor};

use crate::define::Define;

type Decoder = fn(VariantDescriptor, &mut Vec<Define>);

/// Decoders in [`ShaderFamily::ALL`] order.
const DECODERS: [Decoder; 8] = [
    lighting,
    blood_splatter,
    distant_tree,
    sky,
    grass,
    particle,
    water,
    effect,
];

/// Resolves the family-specific defines for a descriptor, in generation order.
pub fn resolve_defines(family: ShaderFamily, descriptor: VariantDescriptor) -> Vec<Define> {
    let mut defines = Vec::new();
    DECODERS[family.index()](descriptor, &mut defines);
    defines
}

fn push_flags(descriptor: VariantDescriptor, table: &[(u32, &str)], out: &mut Vec<Define>) {
    for &(mask, name) in table {
        if descriptor.has(mask) {
            out.push(Define::flag(name));
        }
    }
}

fn push_all(names: &[&str], out: &mut Vec<Define>) {
    out.extend(names.iter().map(|name| Define::flag(*name)));
}

// ─── Lighting ────────────────────────────────────────────────────────────────

/// Technique selector lives in bits 24..30.
pub const LIGHTING_TECHNIQUE_SHIFT: u32 = 24;
/// Technique id that renders object outlines.
pub const LIGHTING_OUTLINE: u32 = 20;

const LIGHTING_TECHNIQUES: [&[&str]; 21] = [
    &[],
    &["ENVMAP"],
    &["GLOWMAP"],
    &["PARALLAX"],
    &["FACEGEN"],
    &["FACEGEN_RGB_TINT"],
    &["HAIR"],
    &["PARALLAX_OCC"],
    &["MULTI_TEXTURE", "LANDSCAPE"],
    &["LODLAND", "LANDSCAPE"],
    &["SNOW"],
    &["MULTI_LAYER_PARALLAX"],
    &["TREE_ANIM"],
    &["LODOBJECTS"],
    &["MULTI_INDEX_SPARKLE"],
    &["LODOBJECTSHD"],
    &["EYE"],
    &["CLOUD"],
    &["LODLANDNOISE", "LODLAND", "LANDSCAPE"],
    &["MULTI_TEXTURE", "LANDSCAPE", "LOD_LAND_BLEND"],
    &["OUTLINE"],
];

const LIGHTING_FLAGS: [(u32, &str); 17] = [
    (1 << 0, "VC"),
    (1 << 1, "SKINNED"),
    (1 << 2, "MODELSPACENORMALS"),
    (1 << 9, "SPECULAR"),
    (1 << 10, "SOFT_LIGHTING"),
    (1 << 11, "RIM_LIGHTING"),
    (1 << 12, "BACK_LIGHTING"),
    (1 << 13, "SHADOW_DIR"),
    (1 << 14, "DEFSHADOW"),
    (1 << 15, "PROJECTED_UV"),
    (1 << 16, "ANISO_LIGHTING"),
    (1 << 17, "AMBIENT_SPECULAR"),
    (1 << 18, "WORLD_MAP"),
    (1 << 19, "BASE_OBJECT_IS_SNOW"),
    (1 << 20, "DO_ALPHA_TEST"),
    (1 << 21, "SNOW"),
    (1 << 22, "CHARACTER_LIGHT"),
];

const LIGHTING_ADDITIONAL_ALPHA_MASK: u32 = 1 << 23;

fn lighting(descriptor: VariantDescriptor, out: &mut Vec<Define>) {
    let technique = descriptor.field(LIGHTING_TECHNIQUE_SHIFT, 0x3F) as usize;
    if let Some(names) = LIGHTING_TECHNIQUES.get(technique) {
        push_all(names, out);
    }

    push_flags(descriptor, &LIGHTING_FLAGS, out);
    if descriptor.has(LIGHTING_ADDITIONAL_ALPHA_MASK) {
        out.push(Define::flag("ADDITIONAL_ALPHA_MASK"));
    }

    let num_lights = descriptor.field(3, 0x7);
    if num_lights != 0 {
        out.push(Define::valued("NUM_LIGHTS", num_lights.to_string()));
    }
}

// ─── BloodSplatter ───────────────────────────────────────────────────────────

fn blood_splatter(descriptor: VariantDescriptor, out: &mut Vec<Define>) {
    match descriptor.bits() {
        0 => out.push(Define::flag("SPLATTER")),
        1 => out.push(Define::flag("FLARE")),
        _ => {}
    }
}

// ─── DistantTree ─────────────────────────────────────────────────────────────

const ALPHA_TEST_FLAG: u32 = 0x10000;

fn distant_tree(descriptor: VariantDescriptor, out: &mut Vec<Define>) {
    if descriptor.field(0, 1) == 1 {
        out.push(Define::flag("RENDER_DEPTH"));
    }
    if descriptor.has(ALPHA_TEST_FLAG) {
        out.push(Define::flag("DO_ALPHA_TEST"));
    }
}

// ─── Sky ─────────────────────────────────────────────────────────────────────

const SKY_TECHNIQUES: [&[&str]; 9] = [
    &["OCCLUSION"],
    &["TEX", "DITHER"],
    &["TEX", "MOONMASK"],
    &["HORIZFADE"],
    &["TEX", "CLOUDS"],
    &["TEX", "CLOUDS", "TEXLERP"],
    &["TEX", "CLOUDS", "TEXFADE"],
    &["TEX"],
    &["DITHER"],
];

fn sky(descriptor: VariantDescriptor, out: &mut Vec<Define>) {
    if let Some(names) = SKY_TECHNIQUES.get(descriptor.bits() as usize) {
        push_all(names, out);
    }
}

// ─── Grass ───────────────────────────────────────────────────────────────────

const GRASS_RENDER_DEPTH: u32 = 8;

fn grass(descriptor: VariantDescriptor, out: &mut Vec<Define>) {
    if descriptor.field(0, 0xF) == GRASS_RENDER_DEPTH {
        out.push(Define::flag("RENDER_DEPTH"));
    }
    if descriptor.has(ALPHA_TEST_FLAG) {
        out.push(Define::flag("DO_ALPHA_TEST"));
    }
}

// ─── Particle ────────────────────────────────────────────────────────────────

const PARTICLE_TECHNIQUES: [&[&str]; 6] = [
    &[],
    &["GRAYSCALE_TO_COLOR"],
    &["GRAYSCALE_TO_ALPHA"],
    &["GRAYSCALE_TO_COLOR", "GRAYSCALE_TO_ALPHA"],
    &["ENVCUBE", "SNOW"],
    &["ENVCUBE", "RAIN"],
];

fn particle(descriptor: VariantDescriptor, out: &mut Vec<Define>) {
    if let Some(names) = PARTICLE_TECHNIQUES.get(descriptor.bits() as usize) {
        push_all(names, out);
    }
}

// ─── Water ───────────────────────────────────────────────────────────────────

const WATER_FLAGS: [(u32, &str); 11] = [
    (1 << 0, "VC"),
    (1 << 1, "NORMAL_TEXCOORD"),
    (1 << 2, "REFLECTIONS"),
    (1 << 3, "REFRACTIONS"),
    (1 << 4, "DEPTH"),
    (1 << 5, "INTERIOR"),
    (1 << 6, "WADING"),
    (1 << 7, "VERTEX_ALPHA_DEPTH"),
    (1 << 8, "CUBEMAP"),
    (1 << 9, "FLOWMAP"),
    (1 << 10, "BLEND_NORMALS"),
];

fn water(descriptor: VariantDescriptor, out: &mut Vec<Define>) {
    push_all(&["WATER", "FOG"], out);
    push_flags(descriptor, &WATER_FLAGS, out);

    match descriptor.field(11, 0xF) {
        8 => out.push(Define::flag("UNDERWATER")),
        9 => out.push(Define::flag("LOD")),
        10 => out.push(Define::flag("STENCIL")),
        11 => out.push(Define::flag("SIMPLE")),
        lights @ 0..=7 => {
            out.push(Define::flag("SPECULAR"));
            out.push(Define::valued("NUM_SPECULAR_LIGHTS", lights.to_string()));
        }
        _ => {}
    }
}

// ─── Effect ──────────────────────────────────────────────────────────────────

/// Effect flag enabling lit effect shaders.
pub const EFFECT_LIGHTING: u32 = 1 << 16;

const EFFECT_FLAGS: [(u32, &str); 26] = [
    (1 << 0, "VC"),
    (1 << 1, "TEXCOORD"),
    (1 << 2, "TEXCOORD_INDEX"),
    (1 << 3, "SKINNED"),
    (1 << 4, "NORMALS"),
    (1 << 5, "BINORMAL_TANGENT"),
    (1 << 6, "TEXTURE"),
    (1 << 7, "INDEXED_TEXTURE"),
    (1 << 8, "FALLOFF"),
    (1 << 10, "ADDBLEND"),
    (1 << 11, "MULTBLEND"),
    (1 << 12, "PARTICLES"),
    (1 << 13, "STRIP_PARTICLES"),
    (1 << 14, "BLOOD"),
    (1 << 15, "MEMBRANE"),
    (EFFECT_LIGHTING, "LIGHTING"),
    (1 << 17, "PROJECTED_UV"),
    (1 << 18, "SOFT"),
    (1 << 19, "GRAYSCALE_TO_COLOR"),
    (1 << 20, "GRAYSCALE_TO_ALPHA"),
    (1 << 21, "IGNORE_TEX_ALPHA"),
    (1 << 22, "MULTBLEND_DECAL"),
    (1 << 23, "ALPHA_TEST"),
    (1 << 24, "SKY_OBJECT"),
    (1 << 25, "MSN_SPU_SKINNED"),
    (1 << 26, "MOTIONVECTORS_NORMALS"),
];

fn effect(descriptor: VariantDescriptor, out: &mut Vec<Define>) {
    push_flags(descriptor, &EFFECT_FLAGS, out);
}
