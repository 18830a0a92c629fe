//! Integration tests for render pass compilation and texture roles
//!
//! Exercises the public description API end to end. No GPU required.
//!
//! Run with: cargo test --test render_pass_integration_tests

use lumen_3d_engine::lumen3d::render::{
    AccessFlags, AttachmentDesc, AttachmentLayout, CompareOp, Extent2D, ImageAspect,
    ImageLayout, PassTarget, PipelineStages, RenderPassDesc, SampleCount, SamplerDesc,
    TextureDesc, TextureFormat, TextureInfo, TextureKind, SUBPASS_EXTERNAL,
};
use lumen_3d_engine::lumen3d::{DeviceLimits, RendererConfig};

#[test]
fn test_integration_msaa_present_layout() {
    let config = RendererConfig::default();
    let samples = config.effective_samples(&DeviceLimits::default());
    assert_eq!(samples, SampleCount::X4);

    let mut layout = AttachmentLayout::new();
    layout.add_attachment(AttachmentDesc::color_resolve_present(TextureFormat::B8G8R8A8_SRGB));
    layout.add_attachment(AttachmentDesc::color_resolve(TextureFormat::R16G16B16A16_SFLOAT));
    layout.add_attachment(AttachmentDesc::color(TextureFormat::B8G8R8A8_SRGB, samples));
    layout.add_attachment(AttachmentDesc::color(TextureFormat::R16G16B16A16_SFLOAT, samples));
    layout.add_attachment(AttachmentDesc::depth(TextureFormat::D32_SFLOAT, samples));

    let compiled = RenderPassDesc::new(layout, PassTarget::Present).compile().unwrap();

    assert_eq!(compiled.color_attachments_count, 2);
    assert_eq!(compiled.samples, SampleCount::X4);
    assert_eq!(compiled.clear_values.len(), 5);

    let first = &compiled.dependencies[0];
    assert_eq!(first.src_subpass, SUBPASS_EXTERNAL);
    assert_eq!(first.dst_subpass, 0);
    assert_eq!(
        first.src_stages,
        PipelineStages::COLOR_ATTACHMENT_OUTPUT | PipelineStages::LATE_FRAGMENT_TESTS
    );
    assert!(first.dst_access.contains(AccessFlags::COLOR_ATTACHMENT_WRITE));
}

#[test]
fn test_integration_shadow_map_roles() {
    let desc = TextureDesc::shadow_map(2048, TextureFormat::D32_SFLOAT);
    let info = TextureInfo::from_desc(&desc).unwrap();

    assert_eq!(info.kind, TextureKind::ShadowMap);
    assert_eq!(info.extent, Extent2D::new(2048, 2048));
    assert_eq!(info.aspect, ImageAspect::DEPTH);
    assert_eq!(info.mip_levels, 1);

    let sampler = SamplerDesc::for_kind(info.kind, info.mip_levels, 16.0).unwrap();
    assert_eq!(sampler.compare, Some(CompareOp::LessOrEqual));
}

#[test]
fn test_integration_shadow_pass_leaves_map_readable() {
    let mut layout = AttachmentLayout::new();
    layout.add_attachment(AttachmentDesc::shadow(TextureFormat::D32_SFLOAT));
    let compiled = RenderPassDesc::new(layout, PassTarget::Offscreen)
        .with_sampled_output()
        .compile()
        .unwrap();

    assert_eq!(compiled.attachments[0].final_layout, ImageLayout::DepthStencilReadOnly);
    assert_eq!(compiled.color_attachments_count, 0);
    let last = compiled.dependencies.last().unwrap();
    assert_eq!(last.dst_subpass, SUBPASS_EXTERNAL);
    assert_eq!(last.dst_stages, PipelineStages::FRAGMENT_SHADER);
}
