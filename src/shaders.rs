//! GLSL shader sources and compilation helpers.
//!
//! All shaders target GLSL 1.40 (OpenGL 3.1), which is widely supported on
//! desktop platforms.

#[cfg(feature = "glow")]
use glow::HasContext;

/// Attribute index of `a_position` in every program.
pub const POSITION_ATTRIBUTE: u32 = 0;
/// Attribute index of `a_tex_coord` in every program.
pub const TEX_COORD_ATTRIBUTE: u32 = 1;

/// Vertex shader shared by both compositing passes.
///
/// Passes the full-screen quad through unchanged.
pub const QUAD_VERTEX_SRC: &str = r"#version 140

in vec2 a_position;
in vec2 a_tex_coord;

out vec2 v_tex_coord;

void main() {
    gl_Position = vec4(a_position, 0.0, 1.0);
    v_tex_coord = a_tex_coord;
}
";

/// Fragment shader that shows the quilt as-is.
///
/// Used when no display is connected or when previewing the quilt itself.
/// Alpha is forced to one so the clear color does not bleed through.
///
/// # Uniforms
///
/// | Name          | Type        | Description         |
/// |---------------|-------------|---------------------|
/// | `u_quilt`     | `sampler2D` | Quilt texture unit  |
pub const QUILT_FRAGMENT_SRC: &str = r"#version 140

in vec2 v_tex_coord;

uniform sampler2D u_quilt;

out vec4 frag_color;

void main() {
    frag_color = vec4(texture(u_quilt, v_tex_coord).rgb, 1.0);
}
";

/// Fragment shader that interleaves quilt views into the lenticular subpixel
/// pattern of a calibrated display.
///
/// Each of the three subpixels of an output pixel picks its own view: the
/// view index comes from the pixel position projected along the lens slant
/// (`pitch`, `tilt`, `center`), offset by `subp` per subpixel. `ri` and `bi`
/// select which sample feeds red and blue, for panels with BGR order.
///
/// # Uniforms
///
/// | Name              | Type        | Description                               |
/// |-------------------|-------------|-------------------------------------------|
/// | `u_quilt`         | `sampler2D` | Quilt texture unit                        |
/// | `pitch`           | `float`     | Lenticules per screen width               |
/// | `tilt`            | `float`     | Lens slant                                |
/// | `center`          | `float`     | View phase offset                         |
/// | `subp`            | `float`     | Subpixel width in screen units            |
/// | `invView`         | `int`       | Reverse the view order                    |
/// | `quiltInvert`     | `int`       | Quilt stored with reversed view order     |
/// | `ri`, `bi`        | `int`       | Sample index feeding red / blue           |
/// | `displayAspect`   | `float`     | Physical display aspect                   |
/// | `quiltAspect`     | `float`     | Aspect of one quilt view                  |
/// | `overscan`        | `int`       | Fill instead of fit on aspect mismatch    |
/// | `tile`            | `vec3`      | Columns, rows, total views                |
/// | `viewPortion`     | `vec2`      | Fraction of the texture holding tiles     |
pub const LIGHTFIELD_FRAGMENT_SRC: &str = r"#version 140

in vec2 v_tex_coord;

uniform sampler2D u_quilt;

uniform float pitch;
uniform float tilt;
uniform float center;
uniform float subp;
uniform int invView;
uniform int quiltInvert;
uniform int ri;
uniform int bi;
uniform float displayAspect;
uniform float quiltAspect;
uniform int overscan;
uniform vec3 tile;
uniform vec2 viewPortion;

out vec4 frag_color;

// Map (u, v, view) to a texel in the quilt; views run in raster order from the
// lower-left tile.
vec2 quilt_coord(vec3 uvz) {
    float view = floor(uvz.z * tile.z);
    float x = (mod(view, tile.x) + uvz.x) / tile.x;
    float y = (floor(view / tile.x) + uvz.y) / tile.y;
    return vec2(x, y) * viewPortion;
}

void main() {
    float invert = (invView + quiltInvert == 1) ? -1.0 : 1.0;

    // Fit (or fill, with overscan) the view aspect into the display.
    vec3 nuv = vec3(v_tex_coord - 0.5, 0.0);
    bool wide = displayAspect >= quiltAspect;
    bool fit_width = (wide && overscan == 0) || (!wide && overscan != 0);
    if (fit_width) {
        nuv.x *= displayAspect / quiltAspect;
    } else {
        nuv.y *= quiltAspect / displayAspect;
    }
    nuv.xy += 0.5;

    if (any(lessThan(nuv.xy, vec2(0.0))) || any(greaterThan(nuv.xy, vec2(1.0)))) {
        frag_color = vec4(0.0, 0.0, 0.0, 1.0);
        return;
    }

    vec4 samples[3];
    for (int i = 0; i < 3; i++) {
        nuv.z = (v_tex_coord.x + float(i) * subp + v_tex_coord.y * tilt) * pitch - center;
        nuv.z = mod(nuv.z + ceil(abs(nuv.z)), 1.0);
        nuv.z = (invert < 0.0) ? 1.0 - nuv.z : nuv.z;
        samples[i] = texture(u_quilt, quilt_coord(nuv));
    }

    frag_color = vec4(samples[ri].r, samples[1].g, samples[bi].b, 1.0);
}
";

/// Compile a shader program from vertex and fragment source strings.
///
/// `a_position` and `a_tex_coord` are bound to [`POSITION_ATTRIBUTE`] and
/// [`TEX_COORD_ATTRIBUTE`] before linking. The compiled shader objects are
/// detached and deleted after successful linking, so only the program handle
/// needs to be cleaned up by the caller.
///
/// # Safety
///
/// Requires a valid, current OpenGL context.
///
/// # Errors
///
/// Returns the driver's log if shader compilation or program linking fails.
#[cfg(feature = "glow")]
pub unsafe fn compile_program(
    gl: &glow::Context,
    vertex_src: &str,
    fragment_src: &str,
) -> Result<glow::Program, crate::GraphicsError> {
    use crate::GraphicsError;

    let program = unsafe { gl.create_program() }.map_err(GraphicsError::Allocation)?;

    let vs = match unsafe { compile_shader(gl, glow::VERTEX_SHADER, vertex_src) } {
        Ok(vs) => vs,
        Err(err) => {
            unsafe { gl.delete_program(program) };
            return Err(err);
        }
    };
    let fs = match unsafe { compile_shader(gl, glow::FRAGMENT_SHADER, fragment_src) } {
        Ok(fs) => fs,
        Err(err) => {
            unsafe {
                gl.delete_shader(vs);
                gl.delete_program(program);
            }
            return Err(err);
        }
    };

    unsafe {
        gl.attach_shader(program, vs);
        gl.attach_shader(program, fs);
        gl.bind_attrib_location(program, POSITION_ATTRIBUTE, "a_position");
        gl.bind_attrib_location(program, TEX_COORD_ATTRIBUTE, "a_tex_coord");
        gl.link_program(program);

        if !gl.get_program_link_status(program) {
            let log = gl.get_program_info_log(program);
            gl.delete_program(program);
            gl.delete_shader(vs);
            gl.delete_shader(fs);
            return Err(GraphicsError::ShaderLink(log));
        }

        // Shaders can be detached and deleted after successful linking.
        gl.detach_shader(program, vs);
        gl.detach_shader(program, fs);
        gl.delete_shader(vs);
        gl.delete_shader(fs);
    }

    Ok(program)
}

/// Compile a single shader stage (vertex or fragment) from source.
///
/// # Safety
///
/// Requires a valid, current OpenGL context.
#[cfg(feature = "glow")]
unsafe fn compile_shader(
    gl: &glow::Context,
    shader_type: u32,
    source: &str,
) -> Result<glow::Shader, crate::GraphicsError> {
    unsafe {
        let shader = gl
            .create_shader(shader_type)
            .map_err(crate::GraphicsError::Allocation)?;
        gl.shader_source(shader, source);
        gl.compile_shader(shader);

        if !gl.get_shader_compile_status(shader) {
            let log = gl.get_shader_info_log(shader);
            gl.delete_shader(shader);
            return Err(crate::GraphicsError::ShaderCompile(log));
        }

        Ok(shader)
    }
}
