use crate::graphics_device::{
    layout_usage, AccessFlags, ImageLayout, PipelineStages, SubpassDependency, SUBPASS_EXTERNAL,
};

#[test]
fn test_external_dependency_masks() {
    let dep = SubpassDependency::external_to_first();
    assert_eq!(dep.src_subpass, SUBPASS_EXTERNAL);
    assert_eq!(dep.dst_subpass, 0);
    assert_eq!(
        dep.src_stages,
        PipelineStages::COLOR_ATTACHMENT_OUTPUT | PipelineStages::LATE_FRAGMENT_TESTS
    );
    assert_eq!(
        dep.dst_stages,
        PipelineStages::COLOR_ATTACHMENT_OUTPUT | PipelineStages::EARLY_FRAGMENT_TESTS
    );
    assert!(dep.dst_access.contains(AccessFlags::COLOR_ATTACHMENT_WRITE));
    assert!(dep.dst_access.contains(AccessFlags::COLOR_ATTACHMENT_READ));
    assert!(dep.dst_access.contains(AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE));
    assert!(dep.dst_access.contains(AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ));
}

#[test]
fn test_chained_dependency_is_by_region() {
    let dep = SubpassDependency::chained(1);
    assert_eq!((dep.src_subpass, dep.dst_subpass), (1, 2));
    assert!(dep.by_region);
}

#[test]
fn test_sampling_dependency_targets_fragment_shader() {
    let dep = SubpassDependency::to_sampling_pass(0);
    assert_eq!(dep.dst_subpass, SUBPASS_EXTERNAL);
    assert_eq!(dep.dst_stages, PipelineStages::FRAGMENT_SHADER);
    assert_eq!(dep.dst_access, AccessFlags::SHADER_READ);
}

#[test]
fn test_layout_usage_for_transfer_layouts() {
    assert_eq!(
        layout_usage(ImageLayout::TransferDst),
        (PipelineStages::TRANSFER, AccessFlags::TRANSFER_WRITE)
    );
    assert_eq!(
        layout_usage(ImageLayout::TransferSrc),
        (PipelineStages::TRANSFER, AccessFlags::TRANSFER_READ)
    );
    assert_eq!(layout_usage(ImageLayout::Undefined).1, AccessFlags::empty());
}
