use iced::widget::canvas::{self, Path, Stroke};
use iced::widget::{container, image, row, stack, text};
use iced::{Color, ContentFit, Element, Length, Point, Rectangle, Size, Theme, mouse};
use trim_engine::time::time_to_x;
use trim_engine::{Command, DragTarget, ThumbnailSlot, TrackGeometry};

use super::preview::PreviewImage;

const TRACK_HEIGHT: f32 = 72.0;

/// Pointer input captured on the trim track.
///
/// Coordinates are window-relative; `track` places the track in the same
/// space so the engine can resolve handles and map positions to time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrackInput {
    Down { x: f32, track: TrackGeometry },
    Move { x: f32, track: TrackGeometry },
    Up,
    Cancel,
}

impl TrackInput {
    pub fn into_command(self) -> Command {
        match self {
            Self::Down { x, track } => Command::PointerDown { x, track },
            Self::Move { x, track } => Command::PointerMove { x, track },
            Self::Up => Command::PointerUp,
            Self::Cancel => Command::PointerCancel,
        }
    }
}

/// What the track draws. Times are in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TrackView {
    pub duration: f64,
    pub start: f64,
    pub end: f64,
    pub playhead: f64,
    pub handle_width: f32,
    pub active: Option<DragTarget>,
}

impl TrackView {
    fn is_interactive(&self) -> bool {
        self.duration.is_finite() && self.duration > 0.0
    }
}

/// One cell of the thumbnail strip.
#[derive(Debug, Clone, PartialEq)]
pub enum StripCell {
    Pending,
    Ready(PreviewImage),
    Placeholder,
}

impl StripCell {
    /// A ready slot whose frame cannot be shown degrades to a placeholder.
    pub fn from_slot(slot: &ThumbnailSlot) -> Self {
        match slot {
            ThumbnailSlot::Pending { .. } => Self::Pending,
            ThumbnailSlot::Placeholder { .. } => Self::Placeholder,
            ThumbnailSlot::Ready(thumbnail) => {
                PreviewImage::from_frame(&thumbnail.frame, thumbnail.sample_time)
                    .map_or(Self::Placeholder, Self::Ready)
            }
        }
    }
}

#[derive(Debug, Default)]
struct TrackState {
    pressed: bool,
}

#[derive(Debug)]
struct TrackProgram<Message> {
    view: TrackView,
    on_input: fn(TrackInput) -> Message,
}

fn track_geometry(bounds: Rectangle) -> TrackGeometry {
    TrackGeometry::new(bounds.x, bounds.width)
}

impl<Message> canvas::Program<Message> for TrackProgram<Message> {
    type State = TrackState;

    fn update(
        &self,
        state: &mut Self::State,
        event: canvas::Event,
        bounds: Rectangle,
        cursor: mouse::Cursor,
    ) -> (canvas::event::Status, Option<Message>) {
        if !self.view.is_interactive() {
            return (canvas::event::Status::Ignored, None);
        }

        let captured = |input| (canvas::event::Status::Captured, Some((self.on_input)(input)));
        match event {
            canvas::Event::Mouse(mouse::Event::ButtonPressed(mouse::Button::Left)) => {
                if cursor.position_in(bounds).is_none() {
                    return (canvas::event::Status::Ignored, None);
                }
                let Some(position) = cursor.position() else {
                    return (canvas::event::Status::Ignored, None);
                };
                state.pressed = true;
                captured(TrackInput::Down {
                    x: position.x,
                    track: track_geometry(bounds),
                })
            }
            canvas::Event::Mouse(mouse::Event::CursorMoved { position }) if state.pressed => {
                captured(TrackInput::Move {
                    x: position.x,
                    track: track_geometry(bounds),
                })
            }
            canvas::Event::Mouse(mouse::Event::ButtonReleased(mouse::Button::Left))
                if state.pressed =>
            {
                state.pressed = false;
                captured(TrackInput::Up)
            }
            canvas::Event::Mouse(mouse::Event::CursorLeft) if state.pressed => {
                state.pressed = false;
                captured(TrackInput::Cancel)
            }
            _ => (canvas::event::Status::Ignored, None),
        }
    }

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &iced::Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: mouse::Cursor,
    ) -> Vec<canvas::Geometry> {
        let mut frame = canvas::Frame::new(renderer, bounds.size());
        let view = &self.view;
        if !view.is_interactive() {
            return vec![frame.into_geometry()];
        }

        let local = TrackGeometry::new(0.0, bounds.width);
        let start_x = time_to_x(view.start, local, view.duration);
        let end_x = time_to_x(view.end, local, view.duration);
        let playhead_x = time_to_x(view.playhead, local, view.duration);
        let height = bounds.height;

        let shade = Color::from_rgba8(0, 0, 0, 0.6);
        frame.fill(
            &Path::rectangle(Point::ORIGIN, Size::new(start_x, height)),
            shade,
        );
        frame.fill(
            &Path::rectangle(
                Point::new(end_x, 0.0),
                Size::new((bounds.width - end_x).max(0.0), height),
            ),
            shade,
        );

        let selection = Color::from_rgb8(250, 204, 21);
        frame.stroke(
            &Path::rectangle(
                Point::new(start_x, 1.0),
                Size::new((end_x - start_x).max(1.0), (height - 2.0).max(1.0)),
            ),
            Stroke::default().with_width(2.0).with_color(selection),
        );

        for (target, x) in [
            (DragTarget::RangeStart, start_x),
            (DragTarget::RangeEnd, end_x),
        ] {
            let color = if view.active == Some(target) {
                Color::WHITE
            } else {
                selection
            };
            let half = view.handle_width * 0.5;
            frame.fill(
                &Path::rectangle(
                    Point::new(x - half, 0.0),
                    Size::new(view.handle_width, height),
                ),
                color,
            );
        }

        let playhead_width = if view.active == Some(DragTarget::Playhead) {
            3.0
        } else {
            2.0
        };
        frame.stroke(
            &Path::line(Point::new(playhead_x, 0.0), Point::new(playhead_x, height)),
            Stroke::default()
                .with_width(playhead_width)
                .with_color(Color::from_rgb8(255, 94, 77)),
        );

        vec![frame.into_geometry()]
    }

    fn mouse_interaction(
        &self,
        state: &Self::State,
        bounds: Rectangle,
        cursor: mouse::Cursor,
    ) -> mouse::Interaction {
        if !self.view.is_interactive() {
            mouse::Interaction::None
        } else if state.pressed {
            mouse::Interaction::Grabbing
        } else if cursor.is_over(bounds) {
            mouse::Interaction::Pointer
        } else {
            mouse::Interaction::None
        }
    }
}

fn strip_cell<'a, Message>(cell: &StripCell) -> Element<'a, Message>
where
    Message: 'a,
{
    let filled = |color: Color| {
        move |_theme: &Theme| container::Style::default().background(color)
    };
    match cell {
        StripCell::Ready(preview) => image(preview.handle.clone())
            .content_fit(ContentFit::Cover)
            .width(Length::Fill)
            .height(Length::Fill)
            .into(),
        StripCell::Pending => container(text(""))
            .width(Length::Fill)
            .height(Length::Fill)
            .style(filled(Color::from_rgb8(34, 36, 42)))
            .into(),
        StripCell::Placeholder => container(text("?").size(14))
            .center_x(Length::Fill)
            .center_y(Length::Fill)
            .style(filled(Color::from_rgb8(52, 54, 62)))
            .into(),
    }
}

/// Renders the thumbnail strip with the interactive track on top.
pub fn view<'a, Message>(
    track: TrackView,
    cells: &'a [StripCell],
    on_input: fn(TrackInput) -> Message,
) -> Element<'a, Message>
where
    Message: 'a,
{
    let strip = row(cells.iter().map(strip_cell))
        .spacing(1)
        .width(Length::Fill)
        .height(Length::Fill);

    container(stack![
        strip,
        canvas::Canvas::new(TrackProgram {
            view: track,
            on_input,
        })
        .width(Length::Fill)
        .height(Length::Fill),
    ])
    .width(Length::Fill)
    .height(Length::Fixed(TRACK_HEIGHT))
    .style(|_theme: &Theme| container::Style::default().background(Color::from_rgb8(22, 24, 29)))
    .into()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use iced::widget::canvas::{self, Program};
    use iced::{Point, Rectangle, mouse};
    use trim_engine::thumbnails::Thumbnail;
    use trim_engine::{Command, PreviewFrame, ThumbnailSlot, TrackGeometry};

    use super::{StripCell, TrackInput, TrackProgram, TrackState, TrackView};

    const BOUNDS: Rectangle = Rectangle {
        x: 10.0,
        y: 40.0,
        width: 100.0,
        height: 72.0,
    };

    fn program(duration: f64) -> TrackProgram<TrackInput> {
        TrackProgram {
            view: TrackView {
                duration,
                start: 0.0,
                end: duration,
                playhead: 0.0,
                handle_width: 8.0,
                active: None,
            },
            on_input: |input| input,
        }
    }

    fn mouse_event(event: mouse::Event) -> canvas::Event {
        canvas::Event::Mouse(event)
    }

    #[test]
    fn press_inside_track_emits_down_with_track_geometry() {
        let program = program(10.0);
        let mut state = TrackState::default();

        let (status, input) = program.update(
            &mut state,
            mouse_event(mouse::Event::ButtonPressed(mouse::Button::Left)),
            BOUNDS,
            mouse::Cursor::Available(Point::new(35.0, 60.0)),
        );

        assert_eq!(status, canvas::event::Status::Captured);
        assert_eq!(
            input,
            Some(TrackInput::Down {
                x: 35.0,
                track: TrackGeometry::new(10.0, 100.0),
            })
        );
        assert!(state.pressed);
    }

    #[test]
    fn press_outside_track_is_ignored() {
        let program = program(10.0);
        let mut state = TrackState::default();

        let (status, input) = program.update(
            &mut state,
            mouse_event(mouse::Event::ButtonPressed(mouse::Button::Left)),
            BOUNDS,
            mouse::Cursor::Available(Point::new(35.0, 5.0)),
        );

        assert_eq!(status, canvas::event::Status::Ignored);
        assert_eq!(input, None);
        assert!(!state.pressed);
    }

    #[test]
    fn moves_are_forwarded_only_while_pressed() {
        let program = program(10.0);
        let mut state = TrackState::default();
        let moved = || {
            mouse_event(mouse::Event::CursorMoved {
                position: Point::new(200.0, 60.0),
            })
        };

        let (_, idle) = program.update(&mut state, moved(), BOUNDS, mouse::Cursor::Unavailable);
        assert_eq!(idle, None);

        state.pressed = true;
        let (_, dragging) =
            program.update(&mut state, moved(), BOUNDS, mouse::Cursor::Unavailable);
        assert_eq!(
            dragging,
            Some(TrackInput::Move {
                x: 200.0,
                track: TrackGeometry::new(10.0, 100.0),
            })
        );
    }

    #[test]
    fn release_and_leave_end_the_press() {
        let program = program(10.0);
        let mut state = TrackState { pressed: true };

        let (_, released) = program.update(
            &mut state,
            mouse_event(mouse::Event::ButtonReleased(mouse::Button::Left)),
            BOUNDS,
            mouse::Cursor::Unavailable,
        );
        assert_eq!(released, Some(TrackInput::Up));
        assert!(!state.pressed);

        let (_, again) = program.update(
            &mut state,
            mouse_event(mouse::Event::ButtonReleased(mouse::Button::Left)),
            BOUNDS,
            mouse::Cursor::Unavailable,
        );
        assert_eq!(again, None);

        state.pressed = true;
        let (_, left) = program.update(
            &mut state,
            mouse_event(mouse::Event::CursorLeft),
            BOUNDS,
            mouse::Cursor::Unavailable,
        );
        assert_eq!(left, Some(TrackInput::Cancel));
    }

    #[test]
    fn empty_track_ignores_input_and_shows_no_pointer() {
        let program = program(0.0);
        let mut state = TrackState::default();
        let cursor = mouse::Cursor::Available(Point::new(35.0, 60.0));

        let (status, input) = program.update(
            &mut state,
            mouse_event(mouse::Event::ButtonPressed(mouse::Button::Left)),
            BOUNDS,
            cursor,
        );
        assert_eq!(status, canvas::event::Status::Ignored);
        assert_eq!(input, None);
        assert_eq!(
            program.mouse_interaction(&state, BOUNDS, cursor),
            mouse::Interaction::None
        );
    }

    #[test]
    fn mouse_interaction_is_pointer_over_loaded_track() {
        let program = program(10.0);
        let interaction = program.mouse_interaction(
            &TrackState::default(),
            BOUNDS,
            mouse::Cursor::Available(Point::new(35.0, 60.0)),
        );

        assert_eq!(interaction, mouse::Interaction::Pointer);
    }

    #[test]
    fn track_input_maps_to_pointer_commands() {
        let track = TrackGeometry::new(0.0, 100.0);

        assert_eq!(
            TrackInput::Down { x: 4.0, track }.into_command(),
            Command::PointerDown { x: 4.0, track }
        );
        assert_eq!(TrackInput::Up.into_command(), Command::PointerUp);
        assert_eq!(TrackInput::Cancel.into_command(), Command::PointerCancel);
    }

    #[test]
    fn strip_cells_follow_slot_state() {
        let ready = ThumbnailSlot::Ready(Thumbnail {
            sample_time: 1.0,
            frame: PreviewFrame {
                width: 1,
                height: 1,
                bytes: Arc::from(vec![0_u8; 4]),
            },
        });
        let truncated = ThumbnailSlot::Ready(Thumbnail {
            sample_time: 2.0,
            frame: PreviewFrame {
                width: 2,
                height: 2,
                bytes: Arc::from(vec![0_u8; 4]),
            },
        });

        assert!(matches!(StripCell::from_slot(&ready), StripCell::Ready(_)));
        assert_eq!(StripCell::from_slot(&truncated), StripCell::Placeholder);
        assert_eq!(
            StripCell::from_slot(&ThumbnailSlot::Pending { sample_time: 0.0 }),
            StripCell::Pending
        );
        assert_eq!(
            StripCell::from_slot(&ThumbnailSlot::Placeholder { sample_time: 0.0 }),
            StripCell::Placeholder
        );
    }
}
