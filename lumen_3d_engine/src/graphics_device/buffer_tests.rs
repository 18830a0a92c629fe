use crate::graphics_device::mock_graphics_device::MockBuffer;
use crate::graphics_device::{check_buffer_range, Buffer, BufferFormat, BufferUsage};

#[test]
fn test_buffer_format_sizes() {
    assert_eq!(BufferFormat::R32G32B32_SFLOAT.size_bytes(), 12);
    assert_eq!(BufferFormat::R32G32_SFLOAT.size_bytes(), 8);
    assert_eq!(BufferFormat::R8G8B8A8_UNORM.size_bytes(), 4);
}

#[test]
fn test_range_check() {
    assert!(check_buffer_range(64, 0, 64).is_ok());
    assert!(check_buffer_range(64, 32, 32).is_ok());
    assert!(check_buffer_range(64, 33, 32).is_err());
    assert!(check_buffer_range(64, u64::MAX, 1).is_err());
}

#[test]
fn test_mock_buffer_update_writes_bytes() {
    let buffer = MockBuffer::new(8, BufferUsage::Uniform, "ubo".to_string());
    buffer.update(4, &[1, 2, 3, 4]).unwrap();
    assert_eq!(buffer.contents(), vec![0, 0, 0, 0, 1, 2, 3, 4]);
    assert!(buffer.update(6, &[0; 4]).is_err());
    assert_eq!(buffer.size(), 8);
}
