//! Test support utilities shared across unit and integration tests.
//!
//! Provides an in-memory provider implementing every client trait, plus a
//! progress sink that records lines instead of printing them. Exposed as a
//! public module (rather than `#[cfg(test)]`) so the behaviour tests in
//! `tests/` can drive the reconcilers without AWS.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use crate::progress::Progress;
use crate::provider::{
    AliasRecord, ApiRecord, FunctionClient, FunctionRecord, FunctionSpec, GatewayClient,
    IntegrationRecord, MethodRecord, PermissionSpec, ProviderError, ProviderFuture, ResourceRecord,
    RoleClient, RoleRecord, ScheduleClient, TargetSpec,
};

/// Progress sink that records lines for assertions.
#[derive(Clone, Debug, Default)]
pub struct RecordingProgress {
    lines: Arc<Mutex<Vec<String>>>,
}

impl RecordingProgress {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the lines recorded so far.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(|err| panic!("progress lock poisoned: {err}"))
            .clone()
    }
}

impl Progress for RecordingProgress {
    fn note(&self, line: &str) {
        self.lines
            .lock()
            .unwrap_or_else(|err| panic!("progress lock poisoned: {err}"))
            .push(line.to_owned());
    }
}

/// Stage deployment captured by the fake provider.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StoredDeployment {
    /// Stage the deployment was published to.
    pub stage: String,
    /// Human-readable deployment description.
    pub description: String,
    /// Stage variables carried by the deployment.
    pub variables: BTreeMap<String, String>,
}

/// Integration captured by the fake provider.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StoredIntegration {
    /// Path of the resource the integration is attached to.
    pub path: String,
    /// Target URI of the integration.
    pub uri: String,
    /// Role credentials attached to the integration.
    pub credentials: String,
}

#[derive(Debug, Default)]
struct State {
    next_id: u32,
    functions: BTreeMap<String, u32>,
    aliases: BTreeMap<(String, String), String>,
    roles: BTreeMap<String, RoleRecord>,
    role_policies: BTreeMap<(String, String), String>,
    apis: BTreeMap<String, String>,
    resources: BTreeMap<(String, String), String>,
    methods: BTreeSet<(String, String, String)>,
    integrations: BTreeMap<(String, String, String), StoredIntegration>,
    deployments: Vec<StoredDeployment>,
    permissions: BTreeMap<(String, String), PermissionSpec>,
    rules: BTreeMap<String, String>,
    targets: BTreeMap<String, TargetSpec>,
    create_function_instants: Vec<Instant>,
    remaining_propagation_failures: u32,
    fail_remove_permission: bool,
    omit_root_resource: bool,
    failures: BTreeMap<String, ProviderError>,
}

impl State {
    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }
}

fn versioned_arn(name: &str, version: u32) -> String {
    format!("arn:aws:lambda:eu-test-1:123456789012:function:{name}:{version}")
}

/// In-memory provider implementing every client trait.
///
/// Resources live in maps keyed the way the reconcilers match them, so
/// duplicate-creation bugs surface as assertion failures on the counts.
/// Failure scenarios are scripted per operation name.
#[derive(Clone, Debug, Default)]
pub struct FakeProvider {
    state: Arc<Mutex<State>>,
}

impl FakeProvider {
    /// Creates an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(|err| panic!("provider state lock poisoned: {err}"))
    }

    fn scripted(&self, operation: &str) -> Result<(), ProviderError> {
        match self.state().failures.get(operation) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    /// Pre-creates a function so reconciliation takes the update path.
    pub fn seed_function(&self, name: &str) {
        self.state().functions.insert(name.to_owned(), 1);
    }

    /// Makes the next `count` create calls fail as role propagation delays.
    pub fn fail_role_propagation(&self, count: u32) {
        self.state().remaining_propagation_failures = count;
    }

    /// Makes permission revocation fail, as it does before the first grant.
    pub fn fail_remove_permission(&self) {
        self.state().fail_remove_permission = true;
    }

    /// Omits the root resource from APIs created afterwards.
    pub fn omit_root_resource(&self) {
        self.state().omit_root_resource = true;
    }

    /// Makes the named operation fail with the given error until cleared.
    pub fn fail_operation(&self, operation: &str, error: ProviderError) {
        self.state().failures.insert(operation.to_owned(), error);
    }

    /// Returns the names of every role created.
    #[must_use]
    pub fn role_names(&self) -> Vec<String> {
        self.state().roles.keys().cloned().collect()
    }

    /// Returns the inline policy attached to a role, when present.
    #[must_use]
    pub fn role_policy(&self, role: &str, policy_name: &str) -> Option<String> {
        self.state()
            .role_policies
            .get(&(role.to_owned(), policy_name.to_owned()))
            .cloned()
    }

    /// Returns the current published version of a function.
    #[must_use]
    pub fn function_version(&self, name: &str) -> Option<u32> {
        self.state().functions.get(name).copied()
    }

    /// Returns the version an alias currently targets.
    #[must_use]
    pub fn alias_target(&self, function: &str, alias: &str) -> Option<String> {
        self.state()
            .aliases
            .get(&(function.to_owned(), alias.to_owned()))
            .cloned()
    }

    /// Returns the names of every API created.
    #[must_use]
    pub fn api_names(&self) -> Vec<String> {
        self.state().apis.keys().cloned().collect()
    }

    /// Returns the paths of every resource across all APIs.
    #[must_use]
    pub fn resource_paths(&self) -> Vec<String> {
        self.state()
            .resources
            .keys()
            .map(|(_, path)| path.clone())
            .collect()
    }

    /// Returns the number of methods across all resources.
    #[must_use]
    pub fn method_count(&self) -> usize {
        self.state().methods.len()
    }

    /// Returns every integration across all resources.
    #[must_use]
    pub fn integrations(&self) -> Vec<StoredIntegration> {
        self.state().integrations.values().cloned().collect()
    }

    /// Returns every stage deployment in creation order.
    #[must_use]
    pub fn deployments(&self) -> Vec<StoredDeployment> {
        self.state().deployments.clone()
    }

    /// Returns the schedule expression of a rule, when present.
    #[must_use]
    pub fn rule_schedule(&self, name: &str) -> Option<String> {
        self.state().rules.get(name).cloned()
    }

    /// Returns the target attached to a rule, when present.
    #[must_use]
    pub fn target(&self, rule: &str) -> Option<TargetSpec> {
        self.state().targets.get(rule).cloned()
    }

    /// Returns every permission statement currently granted.
    #[must_use]
    pub fn permissions(&self) -> Vec<PermissionSpec> {
        self.state().permissions.values().cloned().collect()
    }

    /// Returns the instants at which create calls were issued.
    #[must_use]
    pub fn create_function_instants(&self) -> Vec<Instant> {
        self.state().create_function_instants.clone()
    }
}

impl FunctionClient for FakeProvider {
    fn get_function<'a>(&'a self, name: &'a str) -> ProviderFuture<'a, Option<FunctionRecord>> {
        Box::pin(async move {
            self.scripted("get_function")?;
            let state = self.state();
            Ok(state.functions.get(name).map(|version| FunctionRecord {
                arn: versioned_arn(name, *version),
                version: version.to_string(),
            }))
        })
    }

    fn create_function<'a>(&'a self, spec: &'a FunctionSpec) -> ProviderFuture<'a, FunctionRecord> {
        Box::pin(async move {
            self.scripted("create_function")?;
            let mut state = self.state();
            state.create_function_instants.push(Instant::now());
            if state.remaining_propagation_failures > 0 {
                state.remaining_propagation_failures -= 1;
                return Err(ProviderError::RoleNotPropagated {
                    role: spec.role_arn.clone(),
                });
            }
            state.functions.insert(spec.name.clone(), 1);
            Ok(FunctionRecord {
                arn: versioned_arn(&spec.name, 1),
                version: String::from("1"),
            })
        })
    }

    fn update_function_code<'a>(
        &'a self,
        name: &'a str,
        _archive: &'a [u8],
    ) -> ProviderFuture<'a, FunctionRecord> {
        Box::pin(async move {
            self.scripted("update_function_code")?;
            let mut state = self.state();
            let Some(version) = state.functions.get(name).copied() else {
                return Err(ProviderError::NotFound {
                    resource: String::from("lambda.UpdateFunctionCode"),
                });
            };
            let published = version + 1;
            state.functions.insert(name.to_owned(), published);
            Ok(FunctionRecord {
                arn: versioned_arn(name, published),
                version: published.to_string(),
            })
        })
    }

    fn get_alias<'a>(
        &'a self,
        function: &'a str,
        alias: &'a str,
    ) -> ProviderFuture<'a, Option<AliasRecord>> {
        Box::pin(async move {
            self.scripted("get_alias")?;
            let state = self.state();
            Ok(state
                .aliases
                .get(&(function.to_owned(), alias.to_owned()))
                .map(|version| AliasRecord {
                    name: alias.to_owned(),
                    function_version: version.clone(),
                }))
        })
    }

    fn create_alias<'a>(
        &'a self,
        function: &'a str,
        alias: &'a str,
        version: &'a str,
    ) -> ProviderFuture<'a, ()> {
        Box::pin(async move {
            self.scripted("create_alias")?;
            let mut state = self.state();
            let key = (function.to_owned(), alias.to_owned());
            if state.aliases.contains_key(&key) {
                return Err(ProviderError::Api {
                    operation: String::from("lambda.CreateAlias"),
                    message: String::from("alias already exists"),
                });
            }
            state.aliases.insert(key, version.to_owned());
            Ok(())
        })
    }

    fn update_alias<'a>(
        &'a self,
        function: &'a str,
        alias: &'a str,
        version: &'a str,
    ) -> ProviderFuture<'a, ()> {
        Box::pin(async move {
            self.scripted("update_alias")?;
            let mut state = self.state();
            let key = (function.to_owned(), alias.to_owned());
            if !state.aliases.contains_key(&key) {
                return Err(ProviderError::NotFound {
                    resource: String::from("lambda.UpdateAlias"),
                });
            }
            state.aliases.insert(key, version.to_owned());
            Ok(())
        })
    }

    fn add_permission<'a>(&'a self, spec: &'a PermissionSpec) -> ProviderFuture<'a, ()> {
        Box::pin(async move {
            self.scripted("add_permission")?;
            let mut state = self.state();
            let key = (spec.function.clone(), spec.statement_id.clone());
            if state.permissions.contains_key(&key) {
                return Err(ProviderError::Api {
                    operation: String::from("lambda.AddPermission"),
                    message: String::from("statement id already exists"),
                });
            }
            state.permissions.insert(key, spec.clone());
            Ok(())
        })
    }

    fn remove_permission<'a>(
        &'a self,
        function: &'a str,
        statement_id: &'a str,
        _qualifier: &'a str,
    ) -> ProviderFuture<'a, ()> {
        Box::pin(async move {
            self.scripted("remove_permission")?;
            let mut state = self.state();
            if state.fail_remove_permission {
                return Err(ProviderError::Api {
                    operation: String::from("lambda.RemovePermission"),
                    message: String::from("simulated revocation failure"),
                });
            }
            let key = (function.to_owned(), statement_id.to_owned());
            if state.permissions.remove(&key).is_none() {
                return Err(ProviderError::NotFound {
                    resource: String::from("lambda.RemovePermission"),
                });
            }
            Ok(())
        })
    }
}

impl RoleClient for FakeProvider {
    fn get_role<'a>(&'a self, name: &'a str) -> ProviderFuture<'a, Option<RoleRecord>> {
        Box::pin(async move {
            self.scripted("get_role")?;
            Ok(self.state().roles.get(name).cloned())
        })
    }

    fn create_role<'a>(
        &'a self,
        name: &'a str,
        _trust_policy: &'a str,
    ) -> ProviderFuture<'a, RoleRecord> {
        Box::pin(async move {
            self.scripted("create_role")?;
            let mut state = self.state();
            if state.roles.contains_key(name) {
                return Err(ProviderError::Api {
                    operation: String::from("iam.CreateRole"),
                    message: String::from("role already exists"),
                });
            }
            let record = RoleRecord {
                name: name.to_owned(),
                arn: format!("arn:aws:iam::123456789012:role/service-role/{name}"),
            };
            state.roles.insert(name.to_owned(), record.clone());
            Ok(record)
        })
    }

    fn put_role_policy<'a>(
        &'a self,
        role: &'a str,
        policy_name: &'a str,
        policy: &'a str,
    ) -> ProviderFuture<'a, ()> {
        Box::pin(async move {
            self.scripted("put_role_policy")?;
            let mut state = self.state();
            if !state.roles.contains_key(role) {
                return Err(ProviderError::NotFound {
                    resource: String::from("iam.PutRolePolicy"),
                });
            }
            state
                .role_policies
                .insert((role.to_owned(), policy_name.to_owned()), policy.to_owned());
            Ok(())
        })
    }
}

impl GatewayClient for FakeProvider {
    fn find_api<'a>(&'a self, name: &'a str) -> ProviderFuture<'a, Option<ApiRecord>> {
        Box::pin(async move {
            self.scripted("find_api")?;
            Ok(self
                .state()
                .apis
                .get(name)
                .map(|id| ApiRecord { id: id.clone() }))
        })
    }

    fn create_api<'a>(
        &'a self,
        name: &'a str,
        _description: &'a str,
    ) -> ProviderFuture<'a, ApiRecord> {
        Box::pin(async move {
            self.scripted("create_api")?;
            let mut state = self.state();
            let id = format!("api-{}", state.next_id());
            state.apis.insert(name.to_owned(), id.clone());
            if !state.omit_root_resource {
                let resource_id = format!("res-{}", state.next_id());
                state
                    .resources
                    .insert((id.clone(), String::from("/")), resource_id);
            }
            Ok(ApiRecord { id })
        })
    }

    fn find_resource<'a>(
        &'a self,
        api: &'a ApiRecord,
        path: &'a str,
    ) -> ProviderFuture<'a, Option<ResourceRecord>> {
        Box::pin(async move {
            self.scripted("find_resource")?;
            Ok(self
                .state()
                .resources
                .get(&(api.id.clone(), path.to_owned()))
                .map(|id| ResourceRecord {
                    id: id.clone(),
                    path: path.to_owned(),
                }))
        })
    }

    fn create_resource<'a>(
        &'a self,
        api: &'a ApiRecord,
        parent: &'a ResourceRecord,
        path_part: &'a str,
    ) -> ProviderFuture<'a, ResourceRecord> {
        Box::pin(async move {
            self.scripted("create_resource")?;
            let mut state = self.state();
            let path = if parent.path.ends_with('/') {
                format!("{}{path_part}", parent.path)
            } else {
                format!("{}/{path_part}", parent.path)
            };
            let id = format!("res-{}", state.next_id());
            state
                .resources
                .insert((api.id.clone(), path.clone()), id.clone());
            Ok(ResourceRecord { id, path })
        })
    }

    fn get_method<'a>(
        &'a self,
        api: &'a ApiRecord,
        resource: &'a ResourceRecord,
        http_method: &'a str,
    ) -> ProviderFuture<'a, Option<MethodRecord>> {
        Box::pin(async move {
            self.scripted("get_method")?;
            let key = (api.id.clone(), resource.path.clone(), http_method.to_owned());
            Ok(self.state().methods.contains(&key).then(|| MethodRecord {
                http_method: http_method.to_owned(),
            }))
        })
    }

    fn put_method<'a>(
        &'a self,
        api: &'a ApiRecord,
        resource: &'a ResourceRecord,
        http_method: &'a str,
    ) -> ProviderFuture<'a, MethodRecord> {
        Box::pin(async move {
            self.scripted("put_method")?;
            self.state().methods.insert((
                api.id.clone(),
                resource.path.clone(),
                http_method.to_owned(),
            ));
            Ok(MethodRecord {
                http_method: http_method.to_owned(),
            })
        })
    }

    fn get_integration<'a>(
        &'a self,
        api: &'a ApiRecord,
        resource: &'a ResourceRecord,
        http_method: &'a str,
    ) -> ProviderFuture<'a, Option<IntegrationRecord>> {
        Box::pin(async move {
            self.scripted("get_integration")?;
            let key = (api.id.clone(), resource.path.clone(), http_method.to_owned());
            Ok(self
                .state()
                .integrations
                .get(&key)
                .map(|stored| IntegrationRecord {
                    uri: Some(stored.uri.clone()),
                }))
        })
    }

    fn put_integration<'a>(
        &'a self,
        api: &'a ApiRecord,
        resource: &'a ResourceRecord,
        http_method: &'a str,
        uri: &'a str,
        credentials: &'a str,
    ) -> ProviderFuture<'a, IntegrationRecord> {
        Box::pin(async move {
            self.scripted("put_integration")?;
            let key = (api.id.clone(), resource.path.clone(), http_method.to_owned());
            self.state().integrations.insert(
                key,
                StoredIntegration {
                    path: resource.path.clone(),
                    uri: uri.to_owned(),
                    credentials: credentials.to_owned(),
                },
            );
            Ok(IntegrationRecord {
                uri: Some(uri.to_owned()),
            })
        })
    }

    fn create_deployment<'a>(
        &'a self,
        _api: &'a ApiRecord,
        stage: &'a str,
        description: &'a str,
        variables: &'a BTreeMap<String, String>,
    ) -> ProviderFuture<'a, ()> {
        Box::pin(async move {
            self.scripted("create_deployment")?;
            self.state().deployments.push(StoredDeployment {
                stage: stage.to_owned(),
                description: description.to_owned(),
                variables: variables.clone(),
            });
            Ok(())
        })
    }
}

impl ScheduleClient for FakeProvider {
    fn put_rule<'a>(&'a self, name: &'a str, schedule: &'a str) -> ProviderFuture<'a, String> {
        Box::pin(async move {
            self.scripted("put_rule")?;
            self.state()
                .rules
                .insert(name.to_owned(), schedule.to_owned());
            Ok(format!(
                "arn:aws:events:eu-test-1:123456789012:rule/{name}"
            ))
        })
    }

    fn put_targets<'a>(
        &'a self,
        rule: &'a str,
        target: &'a TargetSpec,
    ) -> ProviderFuture<'a, ()> {
        Box::pin(async move {
            self.scripted("put_targets")?;
            self.state().targets.insert(rule.to_owned(), target.clone());
            Ok(())
        })
    }
}
