/// Thumbnail tiles and grids for selections and results
use iced::widget::image::Handle;
use iced::widget::{button, column, container, text, Image, Space};
use iced::{Alignment, Element, Length};
use iced_aw::Wrap;

use crate::Message;

/// Edge length of a tile's image area
const TILE_SIZE: f32 = 160.0;

/// Selected image with a remove button
pub fn preview_tile<'a>(
    handle: Option<&Handle>,
    name: &'a str,
    on_remove: Message,
) -> Element<'a, Message> {
    column![
        picture(handle),
        text(name).size(12),
        button(text("✕ Remove").size(12))
            .on_press(on_remove)
            .padding(4),
    ]
    .spacing(6)
    .width(Length::Fixed(TILE_SIZE))
    .align_x(Alignment::Center)
    .into()
}

/// Generated image; the handle is missing until its bytes are downloaded
pub fn result_tile<'a>(handle: Option<&Handle>, name: &'a str) -> Element<'a, Message> {
    column![picture(handle), text(name).size(12)]
        .spacing(6)
        .width(Length::Fixed(TILE_SIZE))
        .align_x(Alignment::Center)
        .into()
}

/// Lay tiles out left to right, wrapping to the window width
pub fn grid(tiles: Vec<Element<'_, Message>>) -> Element<'_, Message> {
    Wrap::with_elements(tiles)
        .spacing(12.0)
        .line_spacing(12.0)
        .into()
}

fn picture<'a>(handle: Option<&Handle>) -> Element<'a, Message> {
    match handle {
        Some(handle) => Image::new(handle.clone())
            .width(Length::Fixed(TILE_SIZE))
            .height(Length::Fixed(TILE_SIZE))
            .into(),
        // Placeholder while loading
        None => container(Space::new(Length::Fixed(TILE_SIZE), Length::Fixed(TILE_SIZE)))
            .style(container::bordered_box)
            .into(),
    }
}
