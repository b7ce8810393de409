//! `.pdrh` lowering and deterministic model instantiation.

use crate::{Dist, ModelError, ModelResult};
use rand::rngs::StdRng;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One random-variable declaration, in declaration order.
#[derive(Debug, Clone)]
pub struct RandomVar {
    pub name: String,
    pub dist: Dist,
}

/// A lowered probabilistic model: the deterministic template plus the
/// ordered random-variable table.
///
/// The template preamble carries one `#define <name> {{<name>}}` line per
/// random variable; instantiation substitutes the rendered sample for each
/// `{{<name>}}` slot.
#[derive(Debug, Clone)]
pub struct Model {
    vars: Vec<RandomVar>,
    template: String,
}

impl Model {
    /// Lower a `.pdrh` text: strip `random` declarations, record them in
    /// order, and emit the `#define`-preamble template.
    pub fn parse(text: &str) -> ModelResult<Self> {
        let mut vars: Vec<RandomVar> = Vec::new();
        let mut body = String::new();

        for (idx, line) in text.lines().enumerate() {
            let line_no = idx + 1;
            if line.trim_start().starts_with("random") {
                let var = parse_declaration(line, line_no)?;
                if vars.iter().any(|v| v.name == var.name) {
                    return Err(ModelError::DuplicateRv {
                        line_no,
                        name: var.name,
                    });
                }
                vars.push(var);
            } else {
                body.push_str(line);
                body.push('\n');
            }
        }

        let mut template = String::new();
        for var in &vars {
            template.push_str(&format!("#define {} {{{{{}}}}}\n", var.name, var.name));
        }
        template.push_str(&body);

        debug!(random_vars = vars.len(), "lowered probabilistic model");
        Ok(Self { vars, template })
    }

    /// Read and lower a `.pdrh` file.
    pub fn load(path: impl AsRef<Path>) -> ModelResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Declared random variables, in declaration order.
    pub fn vars(&self) -> &[RandomVar] {
        &self.vars
    }

    /// The deterministic template text.
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Draw one assignment: one rendered value per random variable, in
    /// declaration order. Two assignments are equal iff every rendered value
    /// is byte-identical.
    pub fn sample(&self, rng: &mut StdRng) -> Vec<String> {
        self.vars
            .iter()
            .map(|var| var.dist.sample(rng).to_string())
            .collect()
    }

    /// Substitute an assignment into the template.
    pub fn instantiate(&self, assignment: &[String]) -> ModelResult<String> {
        if assignment.len() != self.vars.len() {
            return Err(ModelError::AssignmentArity {
                got: assignment.len(),
                want: self.vars.len(),
            });
        }
        let mut text = self.template.clone();
        for (var, value) in self.vars.iter().zip(assignment) {
            let slot = format!("{{{{{}}}}}", var.name);
            if !text.contains(&slot) {
                return Err(ModelError::MissingPlaceholder {
                    name: var.name.clone(),
                });
            }
            text = text.replace(&slot, value);
        }
        Ok(text)
    }

    /// Instantiate and write the per-worker model file `numodel_<wid>.drh`
    /// into `dir`, returning its path.
    pub fn write_instance(
        &self,
        assignment: &[String],
        dir: &Path,
        wid: usize,
    ) -> ModelResult<PathBuf> {
        let text = self.instantiate(assignment)?;
        let path = dir.join(format!("numodel_{}.drh", wid));
        std::fs::write(&path, text).map_err(|source| ModelError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }
}

/// Parse `random <dist>(<args>) <name>;`.
fn parse_declaration(line: &str, line_no: usize) -> ModelResult<RandomVar> {
    let bad = |reason: &str| ModelError::BadDistribution {
        line_no,
        reason: reason.to_string(),
    };

    let rest = line
        .trim_start()
        .strip_prefix("random")
        .expect("caller matched the `random` prefix")
        .trim();

    let open = rest.find('(').ok_or_else(|| bad("missing `(`"))?;
    let close = rest.rfind(')').filter(|&c| c > open).ok_or_else(|| bad("missing `)`"))?;

    let keyword = rest[..open].trim();
    if keyword.is_empty() {
        return Err(bad("missing distribution name"));
    }

    let mut args = Vec::new();
    let args_text = rest[open + 1..close].trim();
    if !args_text.is_empty() {
        for raw in args_text.split(',') {
            let value: f64 = raw
                .trim()
                .parse()
                .map_err(|_| bad(&format!("`{}` is not a number", raw.trim())))?;
            args.push(value);
        }
    }

    let name = rest[close + 1..]
        .trim()
        .strip_suffix(';')
        .ok_or_else(|| bad("missing trailing `;`"))?
        .trim();
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(bad("missing or malformed variable name"));
    }

    Ok(RandomVar {
        name: name.to_string(),
        dist: Dist::new(keyword, &args, line_no)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    const PDRH: &str = "\
random uniform(0, 1) lambda;
random normal(8, 0.5) tau;
[0, 10] x;
{ mode 1; invt: (x <= tau); flow: d/dt[x] = lambda; jump: }
init: @1 (x = 0);
goal: @1 (x >= 9);
";

    #[test]
    fn lowering_collects_vars_in_order() {
        let model = Model::parse(PDRH).unwrap();
        let names: Vec<&str> = model.vars().iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, ["lambda", "tau"]);
    }

    #[test]
    fn template_carries_define_slots() {
        let model = Model::parse(PDRH).unwrap();
        assert!(model.template().starts_with("#define lambda {{lambda}}\n#define tau {{tau}}\n"));
        assert!(model.template().contains("goal: @1 (x >= 9);"));
        assert!(!model.template().contains("random"));
    }

    #[test]
    fn instantiation_substitutes_rendered_values() {
        let model = Model::parse(PDRH).unwrap();
        let assignment = vec!["0.25".to_string(), "7.9".to_string()];
        let text = model.instantiate(&assignment).unwrap();
        assert!(text.starts_with("#define lambda 0.25\n#define tau 7.9\n"));
        assert!(!text.contains("{{"));
    }

    #[test]
    fn sampled_assignment_instantiates() {
        let model = Model::parse(PDRH).unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        let assignment = model.sample(&mut rng);
        assert_eq!(assignment.len(), 2);
        let lambda: f64 = assignment[0].parse().unwrap();
        assert!((0.0..1.0).contains(&lambda));
        model.instantiate(&assignment).unwrap();
    }

    #[test]
    fn model_without_random_vars_is_valid() {
        let model = Model::parse("[0, 10] x;\ngoal: @1 (x >= 9);\n").unwrap();
        assert!(model.vars().is_empty());
        assert_eq!(model.sample(&mut StdRng::seed_from_u64(1)), Vec::<String>::new());
        let text = model.instantiate(&[]).unwrap();
        assert!(text.contains("goal"));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let err = Model::parse("random uniform(0, 1) p;\nrandom exp(2) p;\n").unwrap_err();
        match err {
            ModelError::DuplicateRv { name, line_no } => {
                assert_eq!(name, "p");
                assert_eq!(line_no, 2);
            }
            other => panic!("expected DuplicateRv, got {other:?}"),
        }
    }

    #[test]
    fn malformed_declarations_are_rejected() {
        assert!(Model::parse("random uniform 0 1 p;\n").is_err());
        assert!(Model::parse("random uniform(0, 1) p\n").is_err());
        assert!(Model::parse("random uniform(zero, 1) p;\n").is_err());
        assert!(Model::parse("random uniform(0, 1) ;\n").is_err());
    }

    #[test]
    fn wrong_assignment_arity_is_rejected() {
        let model = Model::parse(PDRH).unwrap();
        match model.instantiate(&["0.5".to_string()]) {
            Err(ModelError::AssignmentArity { got: 1, want: 2 }) => {}
            other => panic!("expected AssignmentArity, got {other:?}"),
        }
    }

    #[test]
    fn write_instance_names_the_worker_file() {
        let model = Model::parse(PDRH).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let assignment = vec!["0.1".to_string(), "8.2".to_string()];
        let path = model.write_instance(&assignment, dir.path(), 3).unwrap();
        assert_eq!(path.file_name().unwrap(), "numodel_3.drh");
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("#define tau 8.2"));
    }
}
