#![cfg(feature = "integration-tests")]

use cgmath::{Matrix4, SquareMatrix, Vector2};
use image::{DynamicImage, Rgba, RgbaImage};
use tessera::{
    BlockGroup, ContainerNode, Rect, SceneNode, TextureId, TextureRef, WgpuContext,
    data_structures::texture::Texture,
};

mod common;

use common::test_utils::init_logger;

const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
const GREEN: Rgba<u8> = Rgba([0, 255, 0, 255]);
const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);

/// Pixel under world point (`x`, `y`); world y grows upwards.
fn at(image: &RgbaImage, x: u32, y: u32) -> Rgba<u8> {
    *image.get_pixel(x, image.height() - 1 - y)
}

#[tokio::test]
async fn flat_and_textured_batches_render() {
    init_logger();
    let mut ctx = WgpuContext::headless([64, 64]).await.unwrap();

    let mut swatch = RgbaImage::new(2, 1);
    swatch.put_pixel(0, 0, GREEN);
    swatch.put_pixel(1, 0, BLUE);
    let texture = Texture::from_image(
        &ctx.device,
        &ctx.queue,
        &DynamicImage::ImageRgba8(swatch),
        Some("swatch.png"),
    )
    .unwrap();
    ctx.insert_texture(TextureId::new("swatch.png"), texture);

    let mut flat = BlockGroup::new(&mut ctx, None, Some(1)).unwrap();
    let mut square = flat.create_member(Rect::sized(16.0, 16.0));
    square.move_to(16.0, 16.0);
    square.node.set_color([1.0, 0.0, 0.0, 1.0]);
    flat.add_member(square).unwrap();

    let sheet = TextureRef::new("swatch.png", 2, 1);
    let mut textured = BlockGroup::new(&mut ctx, Some(sheet), Some(1)).unwrap();
    let mut strip = textured.create_member(Rect::sized(2.0, 1.0));
    strip.move_to(48.0, 48.0);
    strip.node.set_scale(Vector2::new(16.0, 16.0));
    textured.add_member(strip).unwrap();

    let mut root = ContainerNode::new();
    root.add_child(Box::new(flat));
    root.add_child(Box::new(textured));
    root.visit(&mut ctx, &Matrix4::identity()).unwrap();
    assert_eq!(ctx.pending_draws(), 2);

    let image = ctx.capture(wgpu::Color::BLACK).await.unwrap();
    assert_eq!(ctx.pending_draws(), 0);
    assert_eq!(at(&image, 2, 2), BLACK);
    assert_eq!(at(&image, 16, 16), RED);
    assert_eq!(at(&image, 40, 48), GREEN);
    assert_eq!(at(&image, 56, 48), BLUE);
    assert_eq!(at(&image, 48, 60), BLACK);

    root.release(&mut ctx);
}

#[tokio::test]
async fn draws_with_unloaded_textures_are_skipped() {
    init_logger();
    let mut ctx = WgpuContext::headless([16, 16]).await.unwrap();

    let sheet = TextureRef::new("missing.png", 8, 8);
    let mut group = BlockGroup::new(&mut ctx, Some(sheet), Some(1)).unwrap();
    let mut block = group.create_member(Rect::sized(8.0, 8.0));
    block.move_to(8.0, 8.0);
    group.add_member(block).unwrap();
    group.visit(&mut ctx, &Matrix4::identity()).unwrap();
    assert_eq!(ctx.pending_draws(), 0);

    let image = ctx.capture(wgpu::Color::BLACK).await.unwrap();
    assert_eq!(at(&image, 8, 8), BLACK);
    group.release(&mut ctx);
}
