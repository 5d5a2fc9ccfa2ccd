use std::path::Path;
use tera::Tera;

/// Load every `.html` page under `dir`.
pub fn load(dir: &Path) -> Result<Tera, tera::Error> {
    let pattern = format!("{}/**/*.html", dir.display());
    let tera = Tera::new(&pattern)?;
    tracing::debug!(
        templates = tera.get_template_names().count(),
        "loaded page templates"
    );
    Ok(tera)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_pages_load() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("templates");
        let tera = load(&dir).unwrap();
        let names: Vec<_> = tera.get_template_names().collect();
        for page in ["base.html", "index.html", "login.html", "admin.html"] {
            assert!(names.contains(&page), "missing {page}");
        }
    }
}
