//! Shader program management
//!
//! Programs are built from one GLSL file per stage, named
//! `<name>.<suffix>.glsl`. Every stage is attempted even when an earlier one
//! fails, so a single build reports all broken stages at once; only the link
//! result decides whether the program is usable.

pub mod uniforms;

pub use uniforms::{TerrainUniforms, TERRAIN_UNIFORM_NAMES};

use crate::rendering::gpu::{GraphicsApi, ShaderStage, UniformValue};
use crate::rendering::{RenderError, RenderResult};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::{debug, error, info};

/// All four stages of a tessellated pipeline, in attach order
pub const TESSELLATION_STAGES: [ShaderStage; 4] = [
    ShaderStage::Vertex,
    ShaderStage::TessellationControl,
    ShaderStage::TessellationEvaluation,
    ShaderStage::Fragment,
];

/// A stage that could not be read or compiled
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderDiagnostic {
    pub stage: ShaderStage,
    pub path: PathBuf,
    pub message: String,
}

impl std::fmt::Display for ShaderDiagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} shader {}: {}", self.stage, self.path.display(), self.message)
    }
}

/// Linked program plus the stages attached to it
pub struct ShaderProgram<G: GraphicsApi> {
    gl: Rc<G>,
    name: String,
    program: G::Program,
    stages: Vec<(ShaderStage, G::Shader)>,
    diagnostics: Vec<ShaderDiagnostic>,
}

impl<G: GraphicsApi> ShaderProgram<G> {
    /// Compile every stage found in `dir` and link them.
    ///
    /// Stage failures are logged and collected; a link failure releases
    /// everything created here and returns [`RenderError::Link`].
    pub fn build(gl: Rc<G>, dir: &Path, name: &str, stages: &[ShaderStage]) -> RenderResult<Self> {
        info!("Building shader program '{}' from {}", name, dir.display());
        let program = gl.create_program()?;

        let mut attached = Vec::with_capacity(stages.len());
        let mut diagnostics = Vec::new();
        for &stage in stages {
            let path = dir.join(format!("{}.{}.glsl", name, stage.suffix()));
            debug!("Loading shader {}...", path.display());
            match load_stage(gl.as_ref(), stage, &path) {
                Ok(shader) => {
                    gl.attach_shader(program, shader);
                    attached.push((stage, shader));
                }
                Err(message) => {
                    error!(
                        "Error compiling shader {} of type {}: {}",
                        path.display(),
                        stage,
                        message
                    );
                    diagnostics.push(ShaderDiagnostic { stage, path, message });
                }
            }
        }

        if let Err(log) = gl.link_program(program) {
            error!("Problem linking shaders for '{}': {}", name, log);
            for (_, shader) in &attached {
                gl.detach_shader(program, *shader);
                gl.delete_shader(*shader);
            }
            gl.delete_program(program);
            return Err(RenderError::Link {
                program: name.to_string(),
                log,
                diagnostics,
            });
        }

        info!("Initialized shaders for '{}'", name);
        debug!("We have {} shaders attached", attached.len());

        Ok(Self {
            gl,
            name: name.to_string(),
            program,
            stages: attached,
            diagnostics,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handle(&self) -> G::Program {
        self.program
    }

    pub fn attached_stages(&self) -> Vec<ShaderStage> {
        self.stages.iter().map(|(stage, _)| *stage).collect()
    }

    /// Stage failures collected while building; empty for a clean build
    pub fn diagnostics(&self) -> &[ShaderDiagnostic] {
        &self.diagnostics
    }

    pub fn bind(&self) {
        self.gl.use_program(Some(self.program));
    }

    pub fn release(&self) {
        self.gl.use_program(None);
    }

    pub fn uniform_location(&self, name: &str) -> Option<G::UniformLocation> {
        self.gl.uniform_location(self.program, name)
    }

    /// Set a uniform on this program; it must be bound
    pub fn set_uniform(&self, location: Option<&G::UniformLocation>, value: UniformValue) {
        self.gl.set_uniform(location, value);
    }

    /// Detach and delete every stage; the program object stays alive
    pub fn remove_all_shaders(&mut self) {
        for (_, shader) in self.stages.drain(..) {
            self.gl.detach_shader(self.program, shader);
            self.gl.delete_shader(shader);
        }
    }

    /// Release the stages and the program object
    pub fn destroy(mut self) {
        self.remove_all_shaders();
        self.gl.delete_program(self.program);
        debug!("Destroyed shader program '{}'", self.name);
    }
}

fn load_stage<G: GraphicsApi>(
    gl: &G,
    stage: ShaderStage,
    path: &Path,
) -> Result<G::Shader, String> {
    let source = fs::read_to_string(path).map_err(|e| format!("cannot read source: {}", e))?;
    let shader = gl.create_shader(stage).map_err(|e| e.to_string())?;
    if let Err(log) = gl.compile_shader(shader, &source) {
        gl.delete_shader(shader);
        return Err(log);
    }
    Ok(shader)
}
