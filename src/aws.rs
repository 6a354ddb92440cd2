//! AWS implementation of the provider client traits.
//!
//! Every SDK failure is classified here, at the client boundary: "not
//! found" signals become absent lookups, the IAM propagation window on a
//! freshly created role becomes [`ProviderError::RoleNotPropagated`], and
//! everything else surfaces as [`ProviderError::Api`] tagged with the
//! failing operation. Reconcilers never see raw SDK errors.

use std::collections::{BTreeMap, HashMap};

use aws_config::SdkConfig;
use aws_sdk_apigateway::types::IntegrationType;
use aws_sdk_eventbridge::types::Target;
use aws_sdk_lambda::error::ProvideErrorMetadata;
use aws_sdk_lambda::primitives::Blob;
use aws_sdk_lambda::types::{FunctionCode, Runtime};

use crate::naming;
use crate::provider::{
    AliasRecord, ApiRecord, FunctionClient, FunctionRecord, FunctionSpec, GatewayClient,
    IntegrationRecord, MethodRecord, PermissionSpec, ProviderError, ProviderFuture, ResourceRecord,
    RoleClient, RoleRecord, ScheduleClient, TargetSpec, optional,
};

/// Error codes the services emit for a missing resource.
const NOT_FOUND_CODES: [&str; 3] = [
    "ResourceNotFoundException",
    "NotFoundException",
    "NoSuchEntity",
];

/// Page size used when listing APIs and resources.
const LIST_LIMIT: i32 = 100;

/// Runtime the generated shim targets.
const SHIM_RUNTIME: Runtime = Runtime::Nodejs18x;

/// Provider backed by the AWS SDK service clients.
#[derive(Clone, Debug)]
pub struct AwsProvider {
    lambda: aws_sdk_lambda::Client,
    iam: aws_sdk_iam::Client,
    apigateway: aws_sdk_apigateway::Client,
    events: aws_sdk_eventbridge::Client,
}

impl AwsProvider {
    /// Builds a provider from shared AWS configuration.
    #[must_use]
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            lambda: aws_sdk_lambda::Client::new(config),
            iam: aws_sdk_iam::Client::new(config),
            apigateway: aws_sdk_apigateway::Client::new(config),
            events: aws_sdk_eventbridge::Client::new(config),
        }
    }
}

/// Classifies an SDK failure by its structured error code.
fn classify<M: ProvideErrorMetadata>(operation: &'static str, error: &M) -> ProviderError {
    classify_parts(operation, error.code(), error.message())
}

fn classify_parts(
    operation: &'static str,
    code: Option<&str>,
    message: Option<&str>,
) -> ProviderError {
    let code = code.unwrap_or_default();
    if NOT_FOUND_CODES.contains(&code) {
        return ProviderError::NotFound {
            resource: operation.to_owned(),
        };
    }

    let message = message
        .filter(|text| !text.is_empty())
        .map_or_else(
            || {
                if code.is_empty() {
                    String::from("request failed before the service responded")
                } else {
                    code.to_owned()
                }
            },
            str::to_owned,
        );
    ProviderError::Api {
        operation: operation.to_owned(),
        message,
    }
}

/// Recognises the propagation window on a freshly created execution role.
///
/// Lambda rejects the create call with `InvalidParameterValueException`
/// until the role is visible to the service; the assume-role wording is
/// what distinguishes it from a genuinely invalid parameter.
fn is_role_propagation_delay(code: Option<&str>, message: Option<&str>) -> bool {
    code == Some("InvalidParameterValueException")
        && message.is_some_and(|text| text.contains("cannot be assumed"))
}

fn missing_field(operation: &'static str, field: &str) -> ProviderError {
    ProviderError::Api {
        operation: operation.to_owned(),
        message: format!("response missing {field}"),
    }
}

fn function_record(
    operation: &'static str,
    arn: Option<&str>,
    version: Option<&str>,
) -> Result<FunctionRecord, ProviderError> {
    match (arn, version) {
        (Some(arn), Some(version)) => Ok(FunctionRecord {
            arn: arn.to_owned(),
            version: version.to_owned(),
        }),
        _ => Err(missing_field(operation, "function ARN or version")),
    }
}

fn role_record(operation: &'static str, role: Option<&aws_sdk_iam::types::Role>) -> Result<RoleRecord, ProviderError> {
    role.map(|role| RoleRecord {
        name: role.role_name().to_owned(),
        arn: role.arn().to_owned(),
    })
    .ok_or_else(|| missing_field(operation, "role"))
}

impl FunctionClient for AwsProvider {
    fn get_function<'a>(&'a self, name: &'a str) -> ProviderFuture<'a, Option<FunctionRecord>> {
        Box::pin(async move {
            let result = self
                .lambda
                .get_function()
                .function_name(name)
                .send()
                .await
                .map_err(|err| classify("lambda.GetFunction", &err))
                .and_then(|output| {
                    let config = output
                        .configuration()
                        .ok_or_else(|| missing_field("lambda.GetFunction", "configuration"))?;
                    function_record("lambda.GetFunction", config.function_arn(), config.version())
                });
            optional(result)
        })
    }

    fn create_function<'a>(&'a self, spec: &'a FunctionSpec) -> ProviderFuture<'a, FunctionRecord> {
        Box::pin(async move {
            let code = FunctionCode::builder()
                .zip_file(Blob::new(spec.archive.clone()))
                .build();
            let output = self
                .lambda
                .create_function()
                .function_name(&spec.name)
                .publish(true)
                .description(&spec.description)
                .handler(&spec.handler)
                .role(&spec.role_arn)
                .runtime(SHIM_RUNTIME)
                .code(code)
                .send()
                .await
                .map_err(|err| {
                    if is_role_propagation_delay(err.code(), err.message()) {
                        ProviderError::RoleNotPropagated {
                            role: spec.role_arn.clone(),
                        }
                    } else {
                        classify("lambda.CreateFunction", &err)
                    }
                })?;
            function_record(
                "lambda.CreateFunction",
                output.function_arn(),
                output.version(),
            )
        })
    }

    fn update_function_code<'a>(
        &'a self,
        name: &'a str,
        archive: &'a [u8],
    ) -> ProviderFuture<'a, FunctionRecord> {
        Box::pin(async move {
            let output = self
                .lambda
                .update_function_code()
                .function_name(name)
                .publish(true)
                .zip_file(Blob::new(archive.to_vec()))
                .send()
                .await
                .map_err(|err| classify("lambda.UpdateFunctionCode", &err))?;
            function_record(
                "lambda.UpdateFunctionCode",
                output.function_arn(),
                output.version(),
            )
        })
    }

    fn get_alias<'a>(
        &'a self,
        function: &'a str,
        alias: &'a str,
    ) -> ProviderFuture<'a, Option<AliasRecord>> {
        Box::pin(async move {
            let result = self
                .lambda
                .get_alias()
                .function_name(function)
                .name(alias)
                .send()
                .await
                .map_err(|err| classify("lambda.GetAlias", &err))
                .and_then(|output| match (output.name(), output.function_version()) {
                    (Some(name), Some(version)) => Ok(AliasRecord {
                        name: name.to_owned(),
                        function_version: version.to_owned(),
                    }),
                    _ => Err(missing_field("lambda.GetAlias", "alias name or version")),
                });
            optional(result)
        })
    }

    fn create_alias<'a>(
        &'a self,
        function: &'a str,
        alias: &'a str,
        version: &'a str,
    ) -> ProviderFuture<'a, ()> {
        Box::pin(async move {
            self.lambda
                .create_alias()
                .function_name(function)
                .name(alias)
                .function_version(version)
                .send()
                .await
                .map_err(|err| classify("lambda.CreateAlias", &err))?;
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
            self.lambda
                .update_alias()
                .function_name(function)
                .name(alias)
                .function_version(version)
                .send()
                .await
                .map_err(|err| classify("lambda.UpdateAlias", &err))?;
            Ok(())
        })
    }

    fn add_permission<'a>(&'a self, spec: &'a PermissionSpec) -> ProviderFuture<'a, ()> {
        Box::pin(async move {
            self.lambda
                .add_permission()
                .function_name(&spec.function)
                .action("lambda:InvokeFunction")
                .principal(&spec.principal)
                .source_arn(&spec.source_arn)
                .statement_id(&spec.statement_id)
                .qualifier(&spec.qualifier)
                .send()
                .await
                .map_err(|err| classify("lambda.AddPermission", &err))?;
            Ok(())
        })
    }

    fn remove_permission<'a>(
        &'a self,
        function: &'a str,
        statement_id: &'a str,
        qualifier: &'a str,
    ) -> ProviderFuture<'a, ()> {
        Box::pin(async move {
            self.lambda
                .remove_permission()
                .function_name(function)
                .statement_id(statement_id)
                .qualifier(qualifier)
                .send()
                .await
                .map_err(|err| classify("lambda.RemovePermission", &err))?;
            Ok(())
        })
    }
}

impl RoleClient for AwsProvider {
    fn get_role<'a>(&'a self, name: &'a str) -> ProviderFuture<'a, Option<RoleRecord>> {
        Box::pin(async move {
            let result = self
                .iam
                .get_role()
                .role_name(name)
                .send()
                .await
                .map_err(|err| classify("iam.GetRole", &err))
                .and_then(|output| role_record("iam.GetRole", output.role()));
            optional(result)
        })
    }

    fn create_role<'a>(
        &'a self,
        name: &'a str,
        trust_policy: &'a str,
    ) -> ProviderFuture<'a, RoleRecord> {
        Box::pin(async move {
            let output = self
                .iam
                .create_role()
                .role_name(name)
                .path(naming::SERVICE_ROLE_PATH)
                .assume_role_policy_document(trust_policy)
                .send()
                .await
                .map_err(|err| classify("iam.CreateRole", &err))?;
            role_record("iam.CreateRole", output.role())
        })
    }

    fn put_role_policy<'a>(
        &'a self,
        role: &'a str,
        policy_name: &'a str,
        policy: &'a str,
    ) -> ProviderFuture<'a, ()> {
        Box::pin(async move {
            self.iam
                .put_role_policy()
                .role_name(role)
                .policy_name(policy_name)
                .policy_document(policy)
                .send()
                .await
                .map_err(|err| classify("iam.PutRolePolicy", &err))?;
            Ok(())
        })
    }
}

impl GatewayClient for AwsProvider {
    fn find_api<'a>(&'a self, name: &'a str) -> ProviderFuture<'a, Option<ApiRecord>> {
        Box::pin(async move {
            let output = self
                .apigateway
                .get_rest_apis()
                .limit(LIST_LIMIT)
                .send()
                .await
                .map_err(|err| classify("apigateway.GetRestApis", &err))?;

            for api in output.items() {
                if api.name() == Some(name) {
                    let id = api
                        .id()
                        .ok_or_else(|| missing_field("apigateway.GetRestApis", "API id"))?;
                    return Ok(Some(ApiRecord { id: id.to_owned() }));
                }
            }
            Ok(None)
        })
    }

    fn create_api<'a>(
        &'a self,
        name: &'a str,
        description: &'a str,
    ) -> ProviderFuture<'a, ApiRecord> {
        Box::pin(async move {
            let output = self
                .apigateway
                .create_rest_api()
                .name(name)
                .description(description)
                .send()
                .await
                .map_err(|err| classify("apigateway.CreateRestApi", &err))?;
            let id = output
                .id()
                .ok_or_else(|| missing_field("apigateway.CreateRestApi", "API id"))?;
            Ok(ApiRecord { id: id.to_owned() })
        })
    }

    fn find_resource<'a>(
        &'a self,
        api: &'a ApiRecord,
        path: &'a str,
    ) -> ProviderFuture<'a, Option<ResourceRecord>> {
        Box::pin(async move {
            let output = self
                .apigateway
                .get_resources()
                .rest_api_id(&api.id)
                .limit(LIST_LIMIT)
                .send()
                .await
                .map_err(|err| classify("apigateway.GetResources", &err))?;

            for resource in output.items() {
                if resource.path() == Some(path) {
                    let id = resource
                        .id()
                        .ok_or_else(|| missing_field("apigateway.GetResources", "resource id"))?;
                    return Ok(Some(ResourceRecord {
                        id: id.to_owned(),
                        path: path.to_owned(),
                    }));
                }
            }
            Ok(None)
        })
    }

    fn create_resource<'a>(
        &'a self,
        api: &'a ApiRecord,
        parent: &'a ResourceRecord,
        path_part: &'a str,
    ) -> ProviderFuture<'a, ResourceRecord> {
        Box::pin(async move {
            let output = self
                .apigateway
                .create_resource()
                .rest_api_id(&api.id)
                .parent_id(&parent.id)
                .path_part(path_part)
                .send()
                .await
                .map_err(|err| classify("apigateway.CreateResource", &err))?;
            let id = output
                .id()
                .ok_or_else(|| missing_field("apigateway.CreateResource", "resource id"))?;
            let path = output
                .path()
                .map_or_else(|| joined_path(&parent.path, path_part), str::to_owned);
            Ok(ResourceRecord {
                id: id.to_owned(),
                path,
            })
        })
    }

    fn get_method<'a>(
        &'a self,
        api: &'a ApiRecord,
        resource: &'a ResourceRecord,
        http_method: &'a str,
    ) -> ProviderFuture<'a, Option<MethodRecord>> {
        Box::pin(async move {
            let result = self
                .apigateway
                .get_method()
                .rest_api_id(&api.id)
                .resource_id(&resource.id)
                .http_method(http_method)
                .send()
                .await
                .map_err(|err| classify("apigateway.GetMethod", &err))
                .map(|output| MethodRecord {
                    http_method: output
                        .http_method()
                        .unwrap_or(http_method)
                        .to_owned(),
                });
            optional(result)
        })
    }

    fn put_method<'a>(
        &'a self,
        api: &'a ApiRecord,
        resource: &'a ResourceRecord,
        http_method: &'a str,
    ) -> ProviderFuture<'a, MethodRecord> {
        Box::pin(async move {
            let output = self
                .apigateway
                .put_method()
                .rest_api_id(&api.id)
                .resource_id(&resource.id)
                .http_method(http_method)
                .authorization_type("NONE")
                .send()
                .await
                .map_err(|err| classify("apigateway.PutMethod", &err))?;
            Ok(MethodRecord {
                http_method: output.http_method().unwrap_or(http_method).to_owned(),
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
            let result = self
                .apigateway
                .get_integration()
                .rest_api_id(&api.id)
                .resource_id(&resource.id)
                .http_method(http_method)
                .send()
                .await
                .map_err(|err| classify("apigateway.GetIntegration", &err))
                .map(|output| IntegrationRecord {
                    uri: output.uri().map(str::to_owned),
                });
            optional(result)
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
            let output = self
                .apigateway
                .put_integration()
                .rest_api_id(&api.id)
                .resource_id(&resource.id)
                .http_method(http_method)
                .integration_http_method("POST")
                .r#type(IntegrationType::AwsProxy)
                .credentials(credentials)
                .uri(uri)
                .send()
                .await
                .map_err(|err| classify("apigateway.PutIntegration", &err))?;
            Ok(IntegrationRecord {
                uri: output.uri().map(str::to_owned),
            })
        })
    }

    fn create_deployment<'a>(
        &'a self,
        api: &'a ApiRecord,
        stage: &'a str,
        description: &'a str,
        variables: &'a BTreeMap<String, String>,
    ) -> ProviderFuture<'a, ()> {
        Box::pin(async move {
            let variables: HashMap<String, String> = variables
                .iter()
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect();
            self.apigateway
                .create_deployment()
                .rest_api_id(&api.id)
                .stage_name(stage)
                .description(description)
                .set_variables(Some(variables))
                .send()
                .await
                .map_err(|err| classify("apigateway.CreateDeployment", &err))?;
            Ok(())
        })
    }
}

impl ScheduleClient for AwsProvider {
    fn put_rule<'a>(&'a self, name: &'a str, schedule: &'a str) -> ProviderFuture<'a, String> {
        Box::pin(async move {
            let output = self
                .events
                .put_rule()
                .name(name)
                .schedule_expression(schedule)
                .send()
                .await
                .map_err(|err| classify("events.PutRule", &err))?;
            output
                .rule_arn()
                .map(str::to_owned)
                .ok_or_else(|| missing_field("events.PutRule", "rule ARN"))
        })
    }

    fn put_targets<'a>(
        &'a self,
        rule: &'a str,
        target: &'a TargetSpec,
    ) -> ProviderFuture<'a, ()> {
        Box::pin(async move {
            let target = Target::builder()
                .id(&target.id)
                .arn(&target.arn)
                .input(&target.input)
                .build()
                .map_err(|err| ProviderError::Api {
                    operation: String::from("events.PutTargets"),
                    message: err.to_string(),
                })?;
            self.events
                .put_targets()
                .rule(rule)
                .targets(target)
                .send()
                .await
                .map_err(|err| classify("events.PutTargets", &err))?;
            Ok(())
        })
    }
}

fn joined_path(parent: &str, path_part: &str) -> String {
    if parent.ends_with('/') {
        format!("{parent}{path_part}")
    } else {
        format!("{parent}/{path_part}")
    }
}
