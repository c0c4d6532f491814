use nalgebra::Matrix4;
use glow::{Context, HasContext as _};

/// Lit triangles on the GPU: one interleaved `xyz rgb` buffer, one draw call.
pub struct GpuMesh {
    program: glow::Program,
    vao:     glow::VertexArray,
    vbo:     glow::Buffer,
    vertex_count: i32,
    u_mvp:   Option<glow::UniformLocation>,
}

// The viewer only touches GL from the paint callback on the UI thread.
unsafe impl Send for GpuMesh {}
unsafe impl Sync for GpuMesh {}

/// Floats per vertex: position then colour.
pub const VERTEX_STRIDE: usize = 6;

impl GpuMesh {
    pub unsafe fn new(gl: &Context) -> Result<Self, String> {
        let program = unsafe {
            let vs = gl.create_shader(glow::VERTEX_SHADER)?;
            gl.shader_source(vs, r#"#version 300 es
                precision highp float;
                uniform mat4 u_mvp;
                layout(location = 0) in vec3 a_pos;
                layout(location = 1) in vec3 a_col;
                out vec3 v_col;
                void main() {
                    v_col       = a_col;
                    gl_Position = u_mvp * vec4(a_pos, 1.0);
                }"#);
            gl.compile_shader(vs);
            if !gl.get_shader_compile_status(vs) {
                return Err(gl.get_shader_info_log(vs));
            }

            let fs = gl.create_shader(glow::FRAGMENT_SHADER)?;
            gl.shader_source(fs, r#"#version 300 es
                precision mediump float;
                in  vec3 v_col;
                out vec4 o_col;
                void main() { o_col = vec4(v_col, 1.0); }"#);
            gl.compile_shader(fs);
            if !gl.get_shader_compile_status(fs) {
                return Err(gl.get_shader_info_log(fs));
            }

            let prog = gl.create_program()?;
            gl.attach_shader(prog, vs);
            gl.attach_shader(prog, fs);
            gl.link_program(prog);
            gl.delete_shader(vs);
            gl.delete_shader(fs);
            if !gl.get_program_link_status(prog) {
                return Err(gl.get_program_info_log(prog));
            }
            prog
        };

        unsafe {
            let vao = gl.create_vertex_array()?;
            let vbo = gl.create_buffer()?;

            let stride = (VERTEX_STRIDE * size_of::<f32>()) as i32;
            gl.bind_vertex_array(Some(vao));
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(vbo));
            gl.enable_vertex_attrib_array(0);
            gl.vertex_attrib_pointer_f32(0, 3, glow::FLOAT, false, stride, 0);
            gl.enable_vertex_attrib_array(1);
            gl.vertex_attrib_pointer_f32(1, 3, glow::FLOAT, false, stride, 12);
            gl.bind_vertex_array(None);

            let u_mvp = gl.get_uniform_location(program, "u_mvp");

            Ok(Self { program, vao, vbo, vertex_count: 0, u_mvp })
        }
    }

    pub unsafe fn upload_vertices(&mut self, gl: &Context, verts: &[f32]) {
        unsafe {
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(self.vbo));
            gl.buffer_data_u8_slice(
                glow::ARRAY_BUFFER,
                bytemuck::cast_slice(verts),
                glow::STATIC_DRAW,
            );
        }
        self.vertex_count = (verts.len() / VERTEX_STRIDE) as i32;
    }

    pub unsafe fn paint(&self, gl: &Context, mvp: Matrix4<f32>) {
        if self.vertex_count == 0 {
            return;
        }
        unsafe {
            gl.enable(glow::DEPTH_TEST);
            gl.clear(glow::DEPTH_BUFFER_BIT);
            gl.use_program(Some(self.program));
            gl.uniform_matrix_4_f32_slice(self.u_mvp.as_ref(), false, mvp.as_slice());
            gl.bind_vertex_array(Some(self.vao));
            gl.draw_arrays(glow::TRIANGLES, 0, self.vertex_count);
            gl.bind_vertex_array(None);
            gl.disable(glow::DEPTH_TEST);
        }
    }
}
