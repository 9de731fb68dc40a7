pub mod prelude {
    pub use super::widgets::Entity as Widgets;
}

pub mod widgets;
