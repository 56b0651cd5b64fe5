use anyhow::{Context as _, Result};
use tera::{Context, Tera};
use crate::add_printer::{DEPARTMENT_MAX, LOCATION_MAX, NAME_MAX};
use crate::api::notice::Notice;
use crate::dashboard::{Dashboard, Toggles};

const HOME: &str = "home.html";

/// Templates compiled into the binary
pub fn templates() -> Result<Tera> {
    let mut tera = Tera::default();
    tera.add_raw_template(HOME, include_str!("../../templates/home.html"))
        .context("Failed to compile home page template")?;
    Ok(tera)
}

pub fn render_home(
    tera: &Tera,
    dashboard: &Dashboard,
    toggles: Toggles,
    notice: Option<Notice>,
) -> Result<String> {
    let mut context = Context::new();
    context.insert("departments", &dashboard.departments());
    context.insert("toggles", &toggles);
    context.insert(
        "last_updated",
        &dashboard
            .last_updated
            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string()),
    );
    context.insert("notice", &notice.map(Notice::view));
    context.insert("name_max", &NAME_MAX);
    context.insert("location_max", &LOCATION_MAX);
    context.insert("department_max", &DEPARTMENT_MAX);

    tera.render(HOME, &context).context("Failed to render home page")
}
