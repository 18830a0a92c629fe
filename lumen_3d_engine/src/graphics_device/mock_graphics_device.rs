/// Mock graphics device for unit tests (no GPU required)
///
/// Resources are plain structs that record what they were asked to do. A
/// shared `MockGpu` simulates the GPU timeline: a submission stays
/// outstanding until a CPU wait on its fence (or `wait_idle`) completes it,
/// in submission order, so throttling bugs show up as a growing
/// `max_outstanding`.

use std::any::Any;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::config::{DeviceLimits, PresentMode};
use crate::error::{Error, Result};
use crate::graphics_device::{
    commit_final_layouts, check_buffer_range, AcquireOutcome, Buffer, BufferDesc, BufferUsage,
    CommandList, CompiledRenderPass, DescriptorPool, DescriptorPoolDesc, DescriptorSet,
    DescriptorSetLayout, DescriptorSetLayoutDesc, DescriptorWrite, Extent2D, FenceStatus,
    FrameSync, Framebuffer, FramebufferAttachment, FramebufferDesc, GraphicsDevice, IndexType,
    LayoutTracker, LayoutTransition, Pipeline, PipelineDesc, PresentOutcome, PushConstantRange,
    Rect2D, RenderPass, RenderPassDesc, SampleCount, SamplerDesc, Shader, ShaderDesc,
    ShaderStage, ShaderStages, Swapchain, Texture, TextureDesc, TextureFormat, TextureInfo,
    Viewport, working_layout,
};

// ============================================================================
// Mock GPU timeline
// ============================================================================

/// One CPU wait on a fence and what it observed when it returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FenceWait {
    pub fence: usize,
    pub status: FenceStatus,
}

/// One queue submission
#[derive(Debug, Clone)]
pub struct MockSubmission {
    pub fence: usize,
    /// Commands of each command list, in submission order
    pub command_lists: Vec<Vec<String>>,
}

#[derive(Debug, Default)]
pub struct MockGpuState {
    /// Signaled flag per fence id
    pub fences: Vec<bool>,
    /// Fences of submissions the GPU has not finished, oldest first
    pub pending: VecDeque<usize>,
    /// Highest number of simultaneously outstanding submissions
    pub max_outstanding: usize,
    pub submissions: Vec<MockSubmission>,
    pub fence_waits: Vec<FenceWait>,
    /// Outcomes returned by the next acquires before normal behaviour resumes
    pub acquire_script: VecDeque<AcquireOutcome>,
    /// Outcomes returned by the next presents before normal behaviour resumes
    pub present_script: VecDeque<PresentOutcome>,
    pub acquire_calls: u32,
    /// Image index of every successful present
    pub presented: Vec<u32>,
    pub swapchain_recreates: u32,
    pub wait_idle_calls: u32,
    /// GPU never finishes anything (device hang)
    pub stalled: bool,
}

/// Shared handle to the simulated GPU
#[derive(Debug, Clone, Default)]
pub struct MockGpu {
    state: Arc<Mutex<MockGpuState>>,
}

impl MockGpu {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutexGuard<'_, MockGpuState> {
        self.state.lock().unwrap()
    }

    pub fn outstanding(&self) -> usize {
        self.state().pending.len()
    }

    pub fn script_acquire(&self, outcome: AcquireOutcome) {
        self.state().acquire_script.push_back(outcome);
    }

    pub fn script_present(&self, outcome: PresentOutcome) {
        self.state().present_script.push_back(outcome);
    }

    pub fn set_stalled(&self, stalled: bool) {
        self.state().stalled = stalled;
    }

    fn new_fence(&self, signaled: bool) -> usize {
        let mut state = self.state();
        state.fences.push(signaled);
        state.fences.len() - 1
    }

    fn submit(&self, fence: usize, command_lists: Vec<Vec<String>>) -> Result<()> {
        let mut state = self.state();
        if state.fences[fence] {
            return Err(Error::BackendError(format!("fence {} submitted while signaled", fence)));
        }
        state.pending.push_back(fence);
        state.max_outstanding = state.max_outstanding.max(state.pending.len());
        state.submissions.push(MockSubmission { fence, command_lists });
        Ok(())
    }

    fn wait(&self, fence: usize) -> FenceStatus {
        let mut state = self.state();
        let status = if state.fences[fence] {
            FenceStatus::Signaled
        } else if state.stalled || !state.pending.contains(&fence) {
            FenceStatus::TimedOut
        } else {
            // in-order completion up to and including this fence
            while let Some(done) = state.pending.pop_front() {
                state.fences[done] = true;
                if done == fence {
                    break;
                }
            }
            FenceStatus::Signaled
        };
        state.fence_waits.push(FenceWait { fence, status });
        status
    }

    fn complete_all(&self) {
        let mut state = self.state();
        if state.stalled {
            return;
        }
        while let Some(done) = state.pending.pop_front() {
            state.fences[done] = true;
        }
    }
}

// ============================================================================
// Mock FrameSync
// ============================================================================

#[derive(Debug)]
pub struct MockFrameSync {
    pub gpu: MockGpu,
    pub fence: usize,
}

impl MockFrameSync {
    pub fn new(gpu: MockGpu) -> Self {
        let fence = gpu.new_fence(true);
        Self { gpu, fence }
    }
}

impl FrameSync for MockFrameSync {
    fn wait(&self, _timeout_ns: u64) -> Result<FenceStatus> {
        Ok(self.gpu.wait(self.fence))
    }

    fn reset(&self) -> Result<()> {
        let mut state = self.gpu.state();
        if state.pending.contains(&self.fence) {
            return Err(Error::BackendError(format!("fence {} reset while in use", self.fence)));
        }
        state.fences[self.fence] = false;
        Ok(())
    }

    fn is_signaled(&self) -> Result<bool> {
        Ok(self.gpu.state().fences[self.fence])
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// Mock Swapchain
// ============================================================================

#[derive(Debug)]
pub struct MockSwapchain {
    pub gpu: MockGpu,
    pub extent: Extent2D,
    pub image_count: usize,
    next_image: u32,
}

impl MockSwapchain {
    pub fn new(gpu: MockGpu, extent: Extent2D, image_count: usize) -> Self {
        Self { gpu, extent, image_count, next_image: 0 }
    }
}

impl Swapchain for MockSwapchain {
    fn acquire_next_image(&mut self, _sync: &dyn FrameSync) -> Result<AcquireOutcome> {
        let scripted = {
            let mut state = self.gpu.state();
            state.acquire_calls += 1;
            state.acquire_script.pop_front()
        };
        let suboptimal = match scripted {
            Some(AcquireOutcome::OutOfDate) => return Ok(AcquireOutcome::OutOfDate),
            Some(AcquireOutcome::Acquired { suboptimal, .. }) => suboptimal,
            None => false,
        };
        let image_index = self.next_image;
        self.next_image = (self.next_image + 1) % self.image_count as u32;
        Ok(AcquireOutcome::Acquired { image_index, suboptimal })
    }

    fn present(&mut self, image_index: u32, _sync: &dyn FrameSync) -> Result<PresentOutcome> {
        let mut state = self.gpu.state();
        let outcome = state.present_script.pop_front().unwrap_or(PresentOutcome::Presented);
        if outcome != PresentOutcome::OutOfDate {
            state.presented.push(image_index);
        }
        Ok(outcome)
    }

    fn recreate(&mut self, extent: Extent2D) -> Result<()> {
        self.extent = extent;
        self.next_image = 0;
        self.gpu.state().swapchain_recreates += 1;
        Ok(())
    }

    fn image_count(&self) -> usize {
        self.image_count
    }

    fn extent(&self) -> Extent2D {
        self.extent
    }

    fn format(&self) -> TextureFormat {
        TextureFormat::B8G8R8A8_SRGB
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// Mock Buffer
// ============================================================================

#[derive(Debug)]
pub struct MockBuffer {
    pub size: u64,
    pub usage: BufferUsage,
    pub name: String,
    data: Mutex<Vec<u8>>,
}

impl MockBuffer {
    pub fn new(size: u64, usage: BufferUsage, name: String) -> Self {
        Self { size, usage, name, data: Mutex::new(vec![0; size as usize]) }
    }

    pub fn contents(&self) -> Vec<u8> {
        self.data.lock().unwrap().clone()
    }
}

impl Buffer for MockBuffer {
    fn update(&self, offset: u64, data: &[u8]) -> Result<()> {
        check_buffer_range(self.size, offset, data.len() as u64)?;
        let start = offset as usize;
        self.data.lock().unwrap()[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn usage(&self) -> BufferUsage {
        self.usage
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// Mock Texture
// ============================================================================

#[derive(Debug)]
pub struct MockTexture {
    pub info: TextureInfo,
    pub name: String,
    tracker: LayoutTracker,
    sampler: Option<SamplerDesc>,
}

impl MockTexture {
    /// Texture as the device leaves it: in its working layout
    pub fn new(desc: TextureDesc, name: String) -> Self {
        let info = TextureInfo::from_desc(&desc).unwrap();
        let sampler = SamplerDesc::for_kind(info.kind, info.mip_levels, 16.0);
        Self {
            tracker: LayoutTracker::new(working_layout(info.kind)),
            info,
            name,
            sampler,
        }
    }
}

impl Texture for MockTexture {
    fn info(&self) -> &TextureInfo {
        &self.info
    }

    fn layout_tracker(&self) -> &LayoutTracker {
        &self.tracker
    }

    fn sampler(&self) -> Option<&SamplerDesc> {
        self.sampler.as_ref()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// Mock Shader / RenderPass / Framebuffer / Pipeline
// ============================================================================

#[derive(Debug)]
pub struct MockShader {
    pub stage: ShaderStage,
    pub entry_point: String,
}

impl MockShader {
    pub fn new(stage: ShaderStage) -> Self {
        Self { stage, entry_point: "main".to_string() }
    }
}

impl Shader for MockShader {
    fn stage(&self) -> ShaderStage {
        self.stage
    }

    fn entry_point(&self) -> &str {
        &self.entry_point
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug)]
pub struct MockRenderPass {
    pub compiled: CompiledRenderPass,
}

impl RenderPass for MockRenderPass {
    fn compiled(&self) -> &CompiledRenderPass {
        &self.compiled
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct MockFramebuffer {
    pub extent: Extent2D,
    pub attachments: Vec<FramebufferAttachment>,
}

impl Framebuffer for MockFramebuffer {
    fn extent(&self) -> Extent2D {
        self.extent
    }

    fn attachments(&self) -> &[FramebufferAttachment] {
        &self.attachments
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug)]
pub struct MockPipeline {
    pub subpass: u32,
    pub samples: SampleCount,
    pub push_constant_ranges: Vec<PushConstantRange>,
    pub set_layout_count: u32,
}

impl Pipeline for MockPipeline {
    fn subpass(&self) -> u32 {
        self.subpass
    }

    fn push_constant_ranges(&self) -> &[PushConstantRange] {
        &self.push_constant_ranges
    }

    fn descriptor_set_layout_count(&self) -> u32 {
        self.set_layout_count
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// Mock descriptors
// ============================================================================

#[derive(Debug)]
pub struct MockDescriptorSetLayout {
    pub desc: DescriptorSetLayoutDesc,
}

impl DescriptorSetLayout for MockDescriptorSetLayout {
    fn desc(&self) -> &DescriptorSetLayoutDesc {
        &self.desc
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct MockDescriptorSet {
    pub layout: Arc<dyn DescriptorSetLayout>,
    /// Binding numbers written so far
    pub written: Mutex<Vec<u32>>,
}

impl DescriptorSet for MockDescriptorSet {
    fn layout(&self) -> &Arc<dyn DescriptorSetLayout> {
        &self.layout
    }

    fn update(&self, writes: &[DescriptorWrite]) -> Result<()> {
        for write in writes {
            self.layout.desc().validate_write(write)?;
        }
        self.written.lock().unwrap().extend(writes.iter().map(|w| w.binding));
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug)]
pub struct MockDescriptorPool {
    pub remaining: u32,
}

impl DescriptorPool for MockDescriptorPool {
    fn allocate(&mut self, layout: &Arc<dyn DescriptorSetLayout>) -> Result<Arc<dyn DescriptorSet>> {
        if self.remaining == 0 {
            return Err(Error::OutOfMemory);
        }
        self.remaining -= 1;
        Ok(Arc::new(MockDescriptorSet {
            layout: Arc::clone(layout),
            written: Mutex::new(Vec::new()),
        }))
    }

    fn remaining_sets(&self) -> u32 {
        self.remaining
    }
}

// ============================================================================
// Mock CommandList
// ============================================================================

pub struct MockCommandList {
    pub commands: Vec<String>,
    pub barriers: Vec<LayoutTransition>,
    pub recording: bool,
    current_pass: Option<(Arc<dyn RenderPass>, Arc<dyn Framebuffer>)>,
}

impl MockCommandList {
    pub fn new() -> Self {
        Self {
            commands: Vec::new(),
            barriers: Vec::new(),
            recording: false,
            current_pass: None,
        }
    }
}

impl Default for MockCommandList {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandList for MockCommandList {
    fn begin(&mut self) -> Result<()> {
        self.commands.clear();
        self.barriers.clear();
        self.recording = true;
        self.commands.push("begin".to_string());
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        if self.current_pass.is_some() {
            return Err(Error::BackendError("end() inside a render pass".to_string()));
        }
        self.recording = false;
        self.commands.push("end".to_string());
        Ok(())
    }

    fn begin_render_pass(
        &mut self,
        render_pass: &Arc<dyn RenderPass>,
        framebuffer: &Arc<dyn Framebuffer>,
    ) -> Result<()> {
        let extent = framebuffer.extent();
        self.commands.push(format!("begin_render_pass {}x{}", extent.width, extent.height));
        self.current_pass = Some((Arc::clone(render_pass), Arc::clone(framebuffer)));
        Ok(())
    }

    fn next_subpass(&mut self) -> Result<()> {
        self.commands.push("next_subpass".to_string());
        Ok(())
    }

    fn end_render_pass(&mut self) -> Result<()> {
        if let Some((render_pass, framebuffer)) = self.current_pass.take() {
            commit_final_layouts(render_pass.as_ref(), framebuffer.as_ref());
        }
        self.commands.push("end_render_pass".to_string());
        Ok(())
    }

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()> {
        self.commands.push(format!("set_viewport {}x{}", viewport.width, viewport.height));
        Ok(())
    }

    fn set_scissor(&mut self, _scissor: Rect2D) -> Result<()> {
        self.commands.push("set_scissor".to_string());
        Ok(())
    }

    fn bind_pipeline(&mut self, _pipeline: &Arc<dyn Pipeline>) -> Result<()> {
        self.commands.push("bind_pipeline".to_string());
        Ok(())
    }

    fn bind_descriptor_set(
        &mut self,
        _pipeline: &Arc<dyn Pipeline>,
        set_index: u32,
        _set: &Arc<dyn DescriptorSet>,
        dynamic_offsets: &[u32],
    ) -> Result<()> {
        self.commands.push(format!("bind_descriptor_set {} {:?}", set_index, dynamic_offsets));
        Ok(())
    }

    fn push_constants(&mut self, _stages: ShaderStages, _offset: u32, data: &[u8]) -> Result<()> {
        self.commands.push(format!("push_constants {}", data.len()));
        Ok(())
    }

    fn bind_vertex_buffer(&mut self, _buffer: &Arc<dyn Buffer>, _offset: u64) -> Result<()> {
        self.commands.push("bind_vertex_buffer".to_string());
        Ok(())
    }

    fn bind_index_buffer(&mut self, _buffer: &Arc<dyn Buffer>, _offset: u64, _index_type: IndexType) -> Result<()> {
        self.commands.push("bind_index_buffer".to_string());
        Ok(())
    }

    fn draw(&mut self, vertex_count: u32, _first_vertex: u32) -> Result<()> {
        self.commands.push(format!("draw {}", vertex_count));
        Ok(())
    }

    fn draw_indexed(&mut self, index_count: u32, _first_index: u32, _vertex_offset: i32) -> Result<()> {
        self.commands.push(format!("draw_indexed {}", index_count));
        Ok(())
    }

    fn texture_barrier(&mut self, _texture: &dyn Texture, transition: &LayoutTransition) -> Result<()> {
        self.commands.push(format!("barrier {:?}", transition.new_layout));
        self.barriers.push(*transition);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// Mock GraphicsDevice
// ============================================================================

pub struct MockGraphicsDevice {
    pub gpu: MockGpu,
    pub limits: DeviceLimits,
    pub swapchain_image_count: usize,
    pub render_passes_created: u32,
    pub textures_created: u32,
    pub framebuffers_created: u32,
    pub pipelines_created: u32,
    pub command_lists_created: u32,
    pub frame_syncs_created: u32,
}

impl MockGraphicsDevice {
    pub fn new() -> Self {
        Self {
            gpu: MockGpu::new(),
            limits: DeviceLimits {
                max_push_constants_size: 128,
                max_sampler_anisotropy: 16.0,
                min_uniform_buffer_offset_alignment: 256,
                max_msaa_samples: SampleCount::X8,
            },
            swapchain_image_count: 3,
            render_passes_created: 0,
            textures_created: 0,
            framebuffers_created: 0,
            pipelines_created: 0,
            command_lists_created: 0,
            frame_syncs_created: 0,
        }
    }
}

impl Default for MockGraphicsDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphicsDevice for MockGraphicsDevice {
    fn limits(&self) -> DeviceLimits {
        self.limits
    }

    fn create_render_pass(&mut self, desc: &RenderPassDesc) -> Result<Arc<dyn RenderPass>> {
        let compiled = desc.compile()?;
        self.render_passes_created += 1;
        Ok(Arc::new(MockRenderPass { compiled }))
    }

    fn create_texture(&mut self, desc: TextureDesc) -> Result<Arc<dyn Texture>> {
        TextureInfo::from_desc(&desc)?;
        self.textures_created += 1;
        let name = format!("texture_{}", self.textures_created);
        Ok(Arc::new(MockTexture::new(desc, name)))
    }

    fn create_framebuffer(
        &mut self,
        desc: &FramebufferDesc,
        swapchain: Option<&dyn Swapchain>,
    ) -> Result<Arc<dyn Framebuffer>> {
        desc.validate(swapchain)?;
        self.framebuffers_created += 1;
        Ok(Arc::new(MockFramebuffer {
            extent: desc.extent,
            attachments: desc.attachments.clone(),
        }))
    }

    fn create_shader(&mut self, desc: ShaderDesc) -> Result<Arc<dyn Shader>> {
        Ok(Arc::new(MockShader { stage: desc.stage, entry_point: desc.entry_point }))
    }

    fn create_pipeline(&mut self, desc: PipelineDesc) -> Result<Arc<dyn Pipeline>> {
        desc.validate(&self.limits)?;
        self.pipelines_created += 1;
        Ok(Arc::new(MockPipeline {
            subpass: desc.subpass,
            samples: desc.multisample.samples,
            push_constant_ranges: desc.push_constant_ranges.clone(),
            set_layout_count: desc.descriptor_set_layouts.len() as u32,
        }))
    }

    fn create_descriptor_set_layout(
        &mut self,
        desc: DescriptorSetLayoutDesc,
    ) -> Result<Arc<dyn DescriptorSetLayout>> {
        desc.validate()?;
        Ok(Arc::new(MockDescriptorSetLayout { desc }))
    }

    fn create_descriptor_pool(&mut self, desc: DescriptorPoolDesc) -> Result<Box<dyn DescriptorPool>> {
        Ok(Box::new(MockDescriptorPool { remaining: desc.max_sets }))
    }

    fn create_buffer(&mut self, desc: BufferDesc) -> Result<Arc<dyn Buffer>> {
        Ok(Arc::new(MockBuffer::new(desc.size, desc.usage, "buffer".to_string())))
    }

    fn create_command_list(&mut self) -> Result<Box<dyn CommandList>> {
        self.command_lists_created += 1;
        Ok(Box::new(MockCommandList::new()))
    }

    fn create_frame_sync(&mut self) -> Result<Box<dyn FrameSync>> {
        self.frame_syncs_created += 1;
        Ok(Box::new(MockFrameSync::new(self.gpu.clone())))
    }

    fn create_swapchain(&mut self, extent: Extent2D, _present_mode: PresentMode) -> Result<Box<dyn Swapchain>> {
        Ok(Box::new(MockSwapchain::new(self.gpu.clone(), extent, self.swapchain_image_count)))
    }

    fn submit_frame(&mut self, command_lists: &[&dyn CommandList], sync: &dyn FrameSync) -> Result<()> {
        let sync = sync
            .as_any()
            .downcast_ref::<MockFrameSync>()
            .ok_or_else(|| Error::BackendError("foreign FrameSync".to_string()))?;
        let mut recorded = Vec::with_capacity(command_lists.len());
        for list in command_lists {
            let list = list
                .as_any()
                .downcast_ref::<MockCommandList>()
                .ok_or_else(|| Error::BackendError("foreign CommandList".to_string()))?;
            if list.recording {
                return Err(Error::BackendError("command list submitted while recording".to_string()));
            }
            recorded.push(list.commands.clone());
        }
        self.gpu.submit(sync.fence, recorded)
    }

    fn wait_idle(&self) -> Result<()> {
        self.gpu.state().wait_idle_calls += 1;
        self.gpu.complete_all();
        Ok(())
    }
}

#[cfg(test)]
#[path = "mock_graphics_device_tests.rs"]
mod tests;
