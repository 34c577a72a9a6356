/// Scene pass: lit, optionally textured meshes into the low-resolution
/// colour target plus a view-space normal / linear depth target.
pub const SCENE_SHADER: &str = r#"
struct Globals {
    view_proj: mat4x4<f32>,
    view: mat4x4<f32>,
    ambient: vec4<f32>,
    light_color: vec4<f32>,
    light_dir: vec4<f32>,
    depth_range: vec4<f32>,
};

@group(0) @binding(0)
var<uniform> globals: Globals;

@group(1) @binding(0)
var albedo: texture_2d<f32>;
@group(1) @binding(1)
var albedo_sampler: sampler;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
};

struct InstanceInput {
    @location(3) model_0: vec4<f32>,
    @location(4) model_1: vec4<f32>,
    @location(5) model_2: vec4<f32>,
    @location(6) model_3: vec4<f32>,
    @location(7) color: vec4<f32>,
    @location(8) emissive: vec4<f32>,
    @location(9) uv_repeat: vec4<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_normal: vec3<f32>,
    @location(1) view_normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
    @location(3) color: vec4<f32>,
    @location(4) emissive: vec4<f32>,
    @location(5) view_depth: f32,
};

struct FragmentOutput {
    @location(0) color: vec4<f32>,
    @location(1) normal_depth: vec4<f32>,
};

@vertex
fn vs_main(vertex: VertexInput, instance: InstanceInput) -> VertexOutput {
    let model = mat4x4<f32>(
        instance.model_0,
        instance.model_1,
        instance.model_2,
        instance.model_3,
    );
    let world_pos = model * vec4<f32>(vertex.position, 1.0);
    let world_normal = normalize((model * vec4<f32>(vertex.normal, 0.0)).xyz);
    let view_pos = globals.view * world_pos;

    var out: VertexOutput;
    out.clip_position = globals.view_proj * world_pos;
    out.world_normal = world_normal;
    out.view_normal = (globals.view * vec4<f32>(world_normal, 0.0)).xyz;
    out.uv = vertex.uv * instance.uv_repeat.xy;
    out.color = instance.color;
    out.emissive = instance.emissive;
    out.view_depth = -view_pos.z;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> FragmentOutput {
    let albedo_texel = textureSample(albedo, albedo_sampler, in.uv);
    let n = normalize(in.world_normal);
    let diffuse = max(dot(n, normalize(globals.light_dir.xyz)), 0.0);
    let light = globals.ambient.rgb + globals.light_color.rgb * diffuse;
    let rgb = in.color.rgb * albedo_texel.rgb * light + in.emissive.rgb;

    let near = globals.depth_range.x;
    let far = globals.depth_range.y;
    let linear_depth = clamp((in.view_depth - near) / (far - near), 0.0, 1.0);

    var out: FragmentOutput;
    out.color = vec4<f32>(rgb, 1.0);
    out.normal_depth = vec4<f32>(normalize(in.view_normal), linear_depth);
    return out;
}
"#;

/// Full-screen pass expanding each low-resolution texel into a flat block
/// and darkening depth and normal edges. Mirrors the CPU pipeline in
/// `pixelscene-render`.
pub const PIXELATE_SHADER: &str = r#"
struct Params {
    resolution: vec2<f32>,
    grid: vec2<f32>,
    pixel_size: f32,
    normal_edge_strength: f32,
    depth_edge_strength: f32,
    _pad: f32,
};

@group(0) @binding(0)
var<uniform> params: Params;
@group(0) @binding(1)
var color_tex: texture_2d<f32>;
@group(0) @binding(2)
var normal_depth_tex: texture_2d<f32>;

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
};

@vertex
fn vs_fullscreen(@builtin(vertex_index) index: u32) -> VertexOutput {
    let uv = vec2<f32>(f32((index << 1u) & 2u), f32(index & 2u));
    var out: VertexOutput;
    out.clip_position = vec4<f32>(uv * 2.0 - 1.0, 0.0, 1.0);
    return out;
}

fn texel(cell: vec2<i32>) -> vec2<i32> {
    let max_cell = vec2<i32>(params.grid) - vec2<i32>(1, 1);
    return clamp(cell, vec2<i32>(0, 0), max_cell);
}

fn depth_at(cell: vec2<i32>) -> f32 {
    return textureLoad(normal_depth_tex, texel(cell), 0).w;
}

fn normal_at(cell: vec2<i32>) -> vec3<f32> {
    return textureLoad(normal_depth_tex, texel(cell), 0).xyz;
}

fn depth_edge_indicator(cell: vec2<i32>, depth: f32) -> f32 {
    var diff = 0.0;
    diff += clamp(depth_at(cell + vec2<i32>(0, -1)) - depth, 0.0, 1.0);
    diff += clamp(depth_at(cell + vec2<i32>(0, 1)) - depth, 0.0, 1.0);
    diff += clamp(depth_at(cell + vec2<i32>(-1, 0)) - depth, 0.0, 1.0);
    diff += clamp(depth_at(cell + vec2<i32>(1, 0)) - depth, 0.0, 1.0);
    return floor(smoothstep(0.01, 0.02, diff) * 2.0) / 2.0;
}

fn neighbour_normal_edge(cell: vec2<i32>, offset: vec2<i32>, depth: f32, normal: vec3<f32>) -> f32 {
    let depth_diff = depth_at(cell + offset) - depth;
    let neighbour = normal_at(cell + offset);
    let normal_diff = dot(normal - neighbour, vec3<f32>(1.0, 1.0, 1.0));
    let normal_indicator = clamp(smoothstep(-0.01, 0.01, normal_diff), 0.0, 1.0);
    let depth_indicator = clamp(sign(depth_diff * 0.25 + 0.0025), 0.0, 1.0);
    return (1.0 - dot(normal, neighbour)) * depth_indicator * normal_indicator;
}

fn normal_edge_indicator(cell: vec2<i32>, depth: f32, normal: vec3<f32>) -> f32 {
    var indicator = 0.0;
    indicator += neighbour_normal_edge(cell, vec2<i32>(0, -1), depth, normal);
    indicator += neighbour_normal_edge(cell, vec2<i32>(0, 1), depth, normal);
    indicator += neighbour_normal_edge(cell, vec2<i32>(-1, 0), depth, normal);
    indicator += neighbour_normal_edge(cell, vec2<i32>(1, 0), depth, normal);
    return step(0.1, indicator);
}

@fragment
fn fs_pixelate(in: VertexOutput) -> @location(0) vec4<f32> {
    let cell = texel(vec2<i32>(floor(in.clip_position.xy / params.pixel_size)));
    let color = textureLoad(color_tex, cell, 0);
    let depth = depth_at(cell);
    let normal = normal_at(cell);

    var dei = 0.0;
    if (params.depth_edge_strength > 0.0) {
        dei = depth_edge_indicator(cell, depth);
    }
    var nei = 0.0;
    if (params.normal_edge_strength > 0.0) {
        nei = normal_edge_indicator(cell, depth, normal);
    }

    var strength = 1.0 - params.normal_edge_strength * nei;
    if (dei > 0.0) {
        strength = 1.0 - params.depth_edge_strength * dei;
    }
    return vec4<f32>(color.rgb * max(strength, 0.0), color.a);
}
"#;
