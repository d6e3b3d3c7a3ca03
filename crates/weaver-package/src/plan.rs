use std::collections::HashSet;

use crate::model::{run_ref, PackageClass, PackageDescription, PackageError, RunRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StepIx(pub u32);

#[derive(Debug, Clone)]
pub struct PlanStep {
    pub name: String,
    pub package: PackageDescription,
}

/// One workflow wiring: `from` step's `output_id` feeds `to` step's `input_id`.
#[derive(Debug, Clone)]
pub struct Edge {
    pub from: (StepIx, String),
    pub to: (StepIx, String),
}

/// An executable plan: the root package, its steps in topological order, and
/// the edges wiring step outputs into later steps' inputs. An application
/// package produces a single synthetic step with no edges.
#[derive(Debug, Clone)]
pub struct Plan {
    pub root: PackageDescription,
    pub steps: Vec<PlanStep>,
    pub edges: Vec<Edge>,
}

impl Plan {
    pub fn step_index(&self, name: &str) -> Option<StepIx> {
        self.steps.iter().position(|s| s.name == name).map(|i| StepIx(i as u32))
    }
}

/// Fetches a nested package description for a workflow step.
#[async_trait::async_trait]
pub trait PackageFetcher: Send + Sync {
    /// Fetches the package registered at `<url>/package` (the step's `run`
    /// was itself a URL).
    async fn fetch(&self, url: &str) -> Result<PackageDescription, PackageError>;

    /// Resolves a local `<name>.cwl` step reference. Per the original
    /// loader, a local reference is converted to a process id and fetched
    /// exactly like a URL reference, just against the locally configured
    /// API base instead of an explicit URL.
    async fn fetch_local(&self, name: &str) -> Result<PackageDescription, PackageError>;
}

/// Recursively resolves a root package into an executable plan.
///
/// For a `CommandLineTool`, this is trivial: one synthetic step, no edges.
/// For a `Workflow`, each `steps[*].run` is resolved — a local `<name>.cwl`
/// reference becomes the step name directly; a URL reference is fetched via
/// `fetcher.fetch(url + "/package")`. In-flight ids are tracked to detect and
/// reject cycles.
pub async fn resolve_plan(root: PackageDescription, fetcher: &dyn PackageFetcher) -> Result<Plan, PackageError> {
    let mut steps = Vec::new();
    let mut edges = Vec::new();
    let mut visiting = HashSet::new();
    resolve_into(&root, &root, fetcher, &mut visiting, &mut steps, &mut edges).await?;
    Ok(Plan { root, steps, edges })
}

fn resolve_into<'a>(
    root: &'a PackageDescription,
    pkg: &'a PackageDescription,
    fetcher: &'a dyn PackageFetcher,
    visiting: &'a mut HashSet<String>,
    steps: &'a mut Vec<PlanStep>,
    edges: &'a mut Vec<Edge>,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), PackageError>> + Send + 'a>> {
    Box::pin(async move {
        match pkg.classify()? {
            PackageClass::Application => {
                steps.push(PlanStep { name: "__root__".to_string(), package: pkg.clone() });
                Ok(())
            }
            PackageClass::Workflow => {
                for (step_name, step_src) in &pkg.steps {
                    if visiting.contains(step_name) {
                        return Err(PackageError::Cycle(step_name.clone()));
                    }
                    visiting.insert(step_name.clone());

                    let sub = match run_ref(&step_src.run) {
                        RunRef::Local(name) => {
                            // Converted to a process id, fetched from the same
                            // source tree as `root` (the local API base), exactly
                            // like a URL reference once resolved.
                            if visiting.contains(&name) {
                                return Err(PackageError::Cycle(name));
                            }
                            visiting.insert(name.clone());
                            let fetched = fetcher.fetch_local(&name).await?;
                            if fetched.classify()? == PackageClass::Workflow {
                                resolve_into(root, &fetched, fetcher, visiting, steps, edges).await?;
                            }
                            visiting.remove(&name);
                            fetched
                        }
                        RunRef::Url(url) => {
                            let nested_url = format!("{}/package", url.trim_end_matches('/'));
                            if visiting.contains(&nested_url) {
                                return Err(PackageError::Cycle(nested_url));
                            }
                            visiting.insert(nested_url.clone());
                            let fetched = fetcher.fetch(&nested_url).await?;
                            if fetched.classify()? == PackageClass::Workflow {
                                resolve_into(root, &fetched, fetcher, visiting, steps, edges).await?;
                            }
                            visiting.remove(&nested_url);
                            fetched
                        }
                    };

                    let this_ix = StepIx(steps.len() as u32);
                    steps.push(PlanStep { name: step_name.clone(), package: sub });

                    for (input_id, source) in &step_src.r#in {
                        if let Some((from_step, from_output)) = source.split_once('/') {
                            if let Some(from_ix) = steps.iter().position(|s| s.name == from_step) {
                                edges.push(Edge {
                                    from: (StepIx(from_ix as u32), from_output.to_string()),
                                    to: (this_ix, input_id.clone()),
                                });
                            }
                        }
                    }

                    visiting.remove(step_name);
                }
                Ok(())
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::parse_package;

    struct NoopFetcher;
    #[async_trait::async_trait]
    impl PackageFetcher for NoopFetcher {
        async fn fetch(&self, _url: &str) -> Result<PackageDescription, PackageError> {
            parse_package(Some("json"), r#"{"class":"CommandLineTool"}"#)
        }

        async fn fetch_local(&self, _name: &str) -> Result<PackageDescription, PackageError> {
            parse_package(Some("json"), r#"{"class":"CommandLineTool"}"#)
        }
    }

    #[tokio::test]
    async fn application_produces_single_step() {
        let pkg = parse_package(Some("json"), r#"{"class":"CommandLineTool"}"#).unwrap();
        let plan = resolve_plan(pkg, &NoopFetcher).await.unwrap();
        assert_eq!(plan.steps.len(), 1);
        assert!(plan.edges.is_empty());
    }

    #[tokio::test]
    async fn workflow_resolves_steps_and_wires_edges() {
        let body = r#"
class: Workflow
steps:
  s1:
    run: p.cwl
    in: {}
    out: [out]
  s2:
    run: q.cwl
    in:
      x: s1/out
    out: [result]
"#;
        let pkg = parse_package(Some("yaml"), body).unwrap();
        let plan = resolve_plan(pkg, &NoopFetcher).await.unwrap();
        assert_eq!(plan.steps.len(), 2);
        assert_eq!(plan.edges.len(), 1);
        let edge = &plan.edges[0];
        assert_eq!(edge.from.1, "out");
        assert_eq!(edge.to.1, "x");
    }

    /// A local `<name>.cwl` step reference must load the real package
    /// registered under that name, not a fabricated empty placeholder — the
    /// step's `docker_pull`/`requirements` have to survive into the plan so
    /// adapter selection and the container runner see the real step.
    struct ByNameFetcher(std::collections::HashMap<String, PackageDescription>);
    #[async_trait::async_trait]
    impl PackageFetcher for ByNameFetcher {
        async fn fetch(&self, _url: &str) -> Result<PackageDescription, PackageError> {
            unreachable!("this test only exercises local step references")
        }

        async fn fetch_local(&self, name: &str) -> Result<PackageDescription, PackageError> {
            self.0
                .get(name)
                .cloned()
                .ok_or_else(|| PackageError::Fetch { url: name.to_string(), detail: "not registered".to_string() })
        }
    }

    #[tokio::test]
    async fn local_step_reference_loads_the_registered_package_by_name() {
        let p1 = parse_package(
            Some("json"),
            r#"{"class":"CommandLineTool","docker_pull":"debian:stretch-slim","requirements":[{"class":"WPS1Requirement"}]}"#,
        )
        .unwrap();
        let mut registry = std::collections::HashMap::new();
        registry.insert("p1".to_string(), p1);

        let body = r#"
class: Workflow
steps:
  s1:
    run: p1.cwl
    in: {}
    out: [out]
"#;
        let pkg = parse_package(Some("yaml"), body).unwrap();
        let plan = resolve_plan(pkg, &ByNameFetcher(registry)).await.unwrap();

        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.steps[0].package.docker_pull.as_deref(), Some("debian:stretch-slim"));
        assert!(plan.steps[0].package.has_requirement("WPS1Requirement"));
    }

    #[tokio::test]
    async fn unregistered_local_step_reference_is_an_error() {
        let body = r#"
class: Workflow
steps:
  s1:
    run: missing.cwl
    in: {}
    out: [out]
"#;
        let pkg = parse_package(Some("yaml"), body).unwrap();
        let err = resolve_plan(pkg, &ByNameFetcher(std::collections::HashMap::new())).await.unwrap_err();
        assert!(matches!(err, PackageError::Fetch { .. }));
    }
}
