use crate::runtime::error::RuntimeError;
use miette::Report;

/// Full diagnostic rendering, with code and help text.
pub fn render_runtime_error(error: &RuntimeError) -> String {
    format!("{:?}", Report::new(error.clone()))
}

pub fn emit_runtime_error(error: &RuntimeError) {
    eprintln!("{}", render_runtime_error(error));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rendering_names_the_error() {
        let rendered = render_runtime_error(&RuntimeError::out_of_range(7, 3));
        assert!(rendered.contains("out of range"));
    }
}
