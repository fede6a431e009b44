// Counting fake GPU and fake themes shared by the integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use stage_core::{
    DrawCall, FrameArgs, Gpu, ProgramDesc, RenderTarget, Result, StageError, TextureDesc, Theme,
};

#[derive(Debug, Default)]
pub struct GpuLog {
    pub textures_live: i64,
    pub textures_created: u64,
    pub framebuffers_live: i64,
    pub programs_live: i64,
    pub programs_created: u64,
    /// Labels of draws, in order.
    pub draws: Vec<String>,
    pub screen_draws: u64,
    pub clears: u64,
    pub frames: u64,
    pub resizes: Vec<(u32, u32)>,
    pub surface: (u32, u32),
    pub lost: bool,
    /// Program labels whose creation fails.
    pub fail_programs: Vec<String>,
    pub fail_textures: bool,
    /// Deletes still release the handle but report an error.
    pub fail_deletes: bool,
}

pub struct FakeTexture {
    pub id: u64,
    pub width: u32,
    pub height: u32,
}

pub struct FakeFramebuffer {
    pub id: u64,
    pub texture: u64,
}

pub struct FakeProgram {
    pub id: u64,
    pub label: String,
    pub texture_count: u32,
}

pub struct FakeGpu {
    pub log: Rc<RefCell<GpuLog>>,
    next_id: u64,
    float_color: bool,
    in_frame: bool,
}

impl FakeGpu {
    pub fn new(width: u32, height: u32) -> (Self, Rc<RefCell<GpuLog>>) {
        let log = Rc::new(RefCell::new(GpuLog {
            surface: (width, height),
            ..Default::default()
        }));
        (
            Self {
                log: log.clone(),
                next_id: 1,
                float_color: true,
                in_frame: false,
            },
            log,
        )
    }

    pub fn without_float(mut self) -> Self {
        self.float_color = false;
        self
    }

    fn check_delete(&self, what: &str) -> Result<()> {
        if self.log.borrow().fail_deletes {
            return Err(StageError::Surface(format!("delete {what}: device error")));
        }
        Ok(())
    }

    fn id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn check_live(&self) -> Result<()> {
        if self.log.borrow().lost {
            Err(StageError::Disposed)
        } else {
            Ok(())
        }
    }
}

impl Gpu for FakeGpu {
    type Texture = FakeTexture;
    type Framebuffer = FakeFramebuffer;
    type Program = FakeProgram;

    fn supports_float_color(&self) -> bool {
        self.float_color
    }

    fn create_texture(&mut self, desc: &TextureDesc<'_>) -> Result<FakeTexture> {
        self.check_live()?;
        if self.log.borrow().fail_textures {
            return Err(StageError::allocation(desc.label, "out of memory"));
        }
        let id = self.id();
        let mut log = self.log.borrow_mut();
        log.textures_live += 1;
        log.textures_created += 1;
        Ok(FakeTexture {
            id,
            width: desc.width,
            height: desc.height,
        })
    }

    fn create_framebuffer(
        &mut self,
        _label: &str,
        texture: &FakeTexture,
    ) -> Result<FakeFramebuffer> {
        self.check_live()?;
        let id = self.id();
        self.log.borrow_mut().framebuffers_live += 1;
        Ok(FakeFramebuffer {
            id,
            texture: texture.id,
        })
    }

    fn delete_texture(&mut self, _texture: FakeTexture) -> Result<()> {
        self.log.borrow_mut().textures_live -= 1;
        self.check_delete("texture")
    }

    fn delete_framebuffer(&mut self, _framebuffer: FakeFramebuffer) -> Result<()> {
        self.log.borrow_mut().framebuffers_live -= 1;
        self.check_delete("framebuffer")
    }

    fn create_program(&mut self, desc: &ProgramDesc<'_>) -> Result<FakeProgram> {
        self.check_live()?;
        if self.log.borrow().fail_programs.iter().any(|l| l == desc.label) {
            return Err(StageError::ShaderCompile {
                label: desc.label.to_string(),
                log: "ERROR: 0:1: forced failure".into(),
            });
        }
        // test sources are not WGSL; built-in ones are checked for real
        if desc.source.contains("fn fs_main") {
            stage_core::validate_wgsl(desc.label, desc.source)?;
        }
        let id = self.id();
        let mut log = self.log.borrow_mut();
        log.programs_live += 1;
        log.programs_created += 1;
        Ok(FakeProgram {
            id,
            label: desc.label.to_string(),
            texture_count: desc.texture_count,
        })
    }

    fn delete_program(&mut self, program: FakeProgram) -> Result<()> {
        self.log.borrow_mut().programs_live -= 1;
        self.check_delete(&program.label)
    }

    fn surface_size(&self) -> (u32, u32) {
        self.log.borrow().surface
    }

    fn resize_surface(&mut self, width: u32, height: u32) {
        let mut log = self.log.borrow_mut();
        log.surface = (width, height);
        log.resizes.push((width, height));
    }

    fn begin_frame(&mut self) -> Result<()> {
        self.check_live()?;
        self.in_frame = true;
        self.log.borrow_mut().frames += 1;
        Ok(())
    }

    fn clear(&mut self, target: RenderTarget<'_, Self>, _color: [f32; 4]) -> Result<()> {
        self.check_live()?;
        assert!(self.in_frame, "clear outside a frame");
        let _ = target;
        self.log.borrow_mut().clears += 1;
        Ok(())
    }

    fn draw(&mut self, call: &DrawCall<'_, Self>) -> Result<()> {
        self.check_live()?;
        assert!(self.in_frame, "draw outside a frame");
        assert_eq!(
            call.textures.len() as u32,
            call.program.texture_count,
            "texture count for {}",
            call.label
        );
        if let RenderTarget::Offscreen(fb) = call.target {
            assert!(
                call.textures.iter().all(|t| t.id != fb.texture),
                "{} samples its own target",
                call.label
            );
        }
        let mut log = self.log.borrow_mut();
        log.draws.push(call.label.to_string());
        if call.target.is_screen() {
            log.screen_draws += 1;
        }
        Ok(())
    }

    fn end_frame(&mut self) -> Result<()> {
        self.in_frame = false;
        Ok(())
    }

    fn lose_context(&mut self) {
        self.log.borrow_mut().lost = true;
    }
}

/// Lifecycle calls per fake theme name.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Calls {
    pub init: u32,
    pub render: u32,
    pub offscreen_renders: u32,
    pub dispose: u32,
}

pub type ThemeLog = Rc<RefCell<BTreeMap<String, Calls>>>;

/// A theme that owns one program and records every lifecycle call.
pub struct FakeTheme {
    name: String,
    log: ThemeLog,
    program: Option<FakeProgram>,
    fail_init: bool,
    fail_dispose: bool,
}

impl FakeTheme {
    pub fn boxed(name: &str, log: &ThemeLog) -> Box<dyn Theme<FakeGpu>> {
        Box::new(Self {
            name: name.to_string(),
            log: log.clone(),
            program: None,
            fail_init: false,
            fail_dispose: false,
        })
    }

    pub fn failing(name: &str, log: &ThemeLog) -> Box<dyn Theme<FakeGpu>> {
        Box::new(Self {
            name: name.to_string(),
            log: log.clone(),
            program: None,
            fail_init: true,
            fail_dispose: false,
        })
    }

    /// Releases its program on dispose, then reports an error anyway.
    pub fn failing_dispose(name: &str, log: &ThemeLog) -> Box<dyn Theme<FakeGpu>> {
        Box::new(Self {
            name: name.to_string(),
            log: log.clone(),
            program: None,
            fail_init: false,
            fail_dispose: true,
        })
    }

    fn calls(&self) -> std::cell::RefMut<'_, Calls> {
        std::cell::RefMut::map(self.log.borrow_mut(), |m| {
            m.entry(self.name.clone()).or_default()
        })
    }
}

impl Theme<FakeGpu> for FakeTheme {
    fn name(&self) -> &str {
        &self.name
    }

    fn init(&mut self, gpu: &mut FakeGpu) -> Result<()> {
        self.calls().init += 1;
        if self.fail_init {
            return Err(StageError::ShaderCompile {
                label: self.name.clone(),
                log: "syntax error".into(),
            });
        }
        self.program = Some(gpu.create_program(&ProgramDesc {
            label: &self.name,
            source: "fake",
            texture_count: 0,
            uniform_size: 16,
        })?);
        Ok(())
    }

    fn render(
        &mut self,
        gpu: &mut FakeGpu,
        target: RenderTarget<'_, FakeGpu>,
        _args: &FrameArgs,
    ) -> Result<()> {
        {
            let mut c = self.calls();
            c.render += 1;
            if !target.is_screen() {
                c.offscreen_renders += 1;
            }
        }
        let program = self.program.as_ref().expect("render before init");
        gpu.draw(&DrawCall {
            label: &self.name,
            target,
            program,
            uniforms: &[0; 16],
            textures: &[],
        })
    }

    fn dispose(&mut self, gpu: &mut FakeGpu) -> Result<()> {
        self.calls().dispose += 1;
        let released = match self.program.take() {
            Some(p) => gpu.delete_program(p),
            None => Ok(()),
        };
        if self.fail_dispose {
            return Err(StageError::Surface(format!("`{}` dispose failed", self.name)));
        }
        released
    }
}

pub fn theme_log() -> ThemeLog {
    Rc::new(RefCell::new(BTreeMap::new()))
}

pub fn calls(log: &ThemeLog, name: &str) -> Calls {
    log.borrow().get(name).cloned().unwrap_or_default()
}
