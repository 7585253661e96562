/// WGSL shader for the scene passes. Vertices arrive in world space with
/// their material already resolved.
pub const SCENE_SHADER: &str = r#"
struct Camera {
    view_proj: mat4x4<f32>,
};

@group(0) @binding(0)
var<uniform> camera: Camera;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) color: vec4<f32>,
    // rgb = emissive, a = 1.0 for unlit materials
    @location(3) emissive: vec4<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_normal: vec3<f32>,
    @location(1) color: vec4<f32>,
    @location(2) emissive: vec4<f32>,
};

@vertex
fn vs_main(vertex: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.clip_position = camera.view_proj * vec4<f32>(vertex.position, 1.0);
    out.world_normal = vertex.normal;
    out.color = vertex.color;
    out.emissive = vertex.emissive;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    var rgb = in.color.rgb;
    if (in.emissive.a < 0.5) {
        let light_dir = normalize(vec3<f32>(0.3, 1.0, 0.5));
        let ambient = 0.3;
        let diffuse = max(dot(normalize(in.world_normal), light_dir), 0.0);
        rgb = rgb * (ambient + diffuse * (1.0 - ambient));
    }
    return vec4<f32>(rgb + in.emissive.rgb, in.color.a);
}
"#;

/// Fullscreen triangle shared by every image-space pass.
const FULLSCREEN: &str = r#"
@vertex
fn vs_fullscreen(@builtin(vertex_index) index: u32) -> @builtin(position) vec4<f32> {
    let x = f32((index << 1u) & 2u);
    let y = f32(index & 2u);
    return vec4<f32>(x * 2.0 - 1.0, y * 2.0 - 1.0, 0.0, 1.0);
}

fn pixel(position: vec4<f32>) -> vec2<i32> {
    return vec2<i32>(floor(position.xy));
}
"#;

const THRESHOLD: &str = r#"
@group(0) @binding(0)
var source: texture_2d<f32>;

@group(1) @binding(0)
// x = threshold, y = strength
var<uniform> params: vec4<f32>;

@fragment
fn fs_main(@builtin(position) position: vec4<f32>) -> @location(0) vec4<f32> {
    let color = textureLoad(source, pixel(position), 0);
    let luminance = dot(color.rgb, vec3<f32>(0.2126, 0.7152, 0.0722));
    if (luminance < params.x) {
        return vec4<f32>(0.0);
    }
    return color * params.y;
}
"#;

const BLUR: &str = r#"
struct Blur {
    direction: vec2<i32>,
    half_width: u32,
    _pad: u32,
    weights: array<vec4<f32>, 9>,
};

@group(0) @binding(0)
var source: texture_2d<f32>;

@group(1) @binding(0)
var<uniform> params: Blur;

fn weight(i: u32) -> f32 {
    return params.weights[i / 4u][i % 4u];
}

@fragment
fn fs_main(@builtin(position) position: vec4<f32>) -> @location(0) vec4<f32> {
    let centre = pixel(position);
    let last = vec2<i32>(textureDimensions(source)) - vec2<i32>(1);
    var acc = textureLoad(source, centre, 0) * weight(0u);
    for (var i = 1u; i <= params.half_width; i = i + 1u) {
        let offset = params.direction * i32(i);
        let lo = clamp(centre - offset, vec2<i32>(0), last);
        let hi = clamp(centre + offset, vec2<i32>(0), last);
        acc = acc + (textureLoad(source, lo, 0) + textureLoad(source, hi, 0)) * weight(i);
    }
    return acc;
}
"#;

const COMPOSITE: &str = r#"
@group(0) @binding(0)
var base: texture_2d<f32>;
@group(0) @binding(1)
var bloom: texture_2d<f32>;

@group(1) @binding(0)
// x = bloom factor
var<uniform> params: vec4<f32>;

@fragment
fn fs_main(@builtin(position) position: vec4<f32>) -> @location(0) vec4<f32> {
    let p = pixel(position);
    return textureLoad(base, p, 0) + textureLoad(bloom, p, 0) * params.x;
}
"#;

const PRESENT: &str = r#"
@group(0) @binding(0)
var source: texture_2d<f32>;

@group(1) @binding(0)
// x = exposure
var<uniform> params: vec4<f32>;

@fragment
fn fs_main(@builtin(position) position: vec4<f32>) -> @location(0) vec4<f32> {
    let color = textureLoad(source, pixel(position), 0);
    return clamp(vec4<f32>(color.rgb * params.x, color.a), vec4<f32>(0.0), vec4<f32>(1.0));
}
"#;

/// Image-space pass sources, each prefixed with the fullscreen vertex stage.
pub fn threshold_shader() -> String {
    format!("{FULLSCREEN}{THRESHOLD}")
}

pub fn blur_shader() -> String {
    format!("{FULLSCREEN}{BLUR}")
}

pub fn composite_shader() -> String {
    format!("{FULLSCREEN}{COMPOSITE}")
}

pub fn present_shader() -> String {
    format!("{FULLSCREEN}{PRESENT}")
}
