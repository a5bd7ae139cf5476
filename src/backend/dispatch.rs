use reqwest::Method;
use serde_json::Value;
use tracing::{debug, info};

use super::client::{parse_method, Backend};
use super::encoding::{interpolate_path, render_body, Scope};
use super::envelope::Reply;
use crate::error::ConsoleResult;
use crate::resource::registry::{ActionDef, ApiDef, ResourceDef};

/// One fully resolved backend request
#[derive(Debug, Clone, PartialEq)]
pub struct ActionRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

impl ActionRequest {
    /// Resolve path and body of an API call against a scope
    pub fn resolve(api: &ApiDef, body: Option<&Value>, scope: &Scope) -> ConsoleResult<Self> {
        let method = parse_method(&api.method);
        let path = interpolate_path(&api.path, scope)?;
        let body = match body {
            Some(template) => Some(render_body(template, scope)),
            None if method != Method::GET && method != Method::DELETE => scope.form.cloned(),
            None => None,
        };
        Ok(Self { method, path, body })
    }

    /// Request for an action; the body defaults to the submitted form values
    pub fn for_action(action: &ActionDef, scope: &Scope) -> ConsoleResult<Self> {
        Self::resolve(&action.api, action.body.as_ref(), scope)
    }
}

/// List resources using the resource definition.
/// `parents` carries the chain of selected ancestors for sub-resources, nearest last.
pub async fn list_resources(
    backend: &dyn Backend,
    resource: &ResourceDef,
    parents: &[Value],
) -> ConsoleResult<Vec<Value>> {
    let scope = Scope::default().with_parents(parents);
    let path = interpolate_path(&resource.api.path, &scope)?;
    let body = resource.list_body.as_ref().map(|t| render_body(t, &scope));

    debug!("Listing resources: {} -> {}", resource.display_name, path);

    let reply = backend
        .call(parse_method(&resource.api.method), &path, body)
        .await?;
    let items = reply.items(&resource.response_path);

    info!("Listed {} {} items", items.len(), resource.display_name);
    Ok(items)
}

/// Full record of one item: the detail endpoint when declared, else the row itself
pub async fn fetch_detail(
    backend: &dyn Backend,
    resource: &ResourceDef,
    item: &Value,
    parents: &[Value],
) -> ConsoleResult<Value> {
    let Some(detail) = &resource.detail else {
        return Ok(item.clone());
    };
    let key = resource.natural_key(item).unwrap_or_default();
    let scope = Scope::item(&key, item).with_parents(parents);
    let request = ActionRequest::resolve(detail, None, &scope)?;

    debug!("Describing {} '{}'", resource.display_name, key);
    let reply = execute(backend, &request).await?;
    Ok(reply.data())
}

/// Send a resolved request and unwrap the envelope
pub async fn execute(backend: &dyn Backend, request: &ActionRequest) -> ConsoleResult<Reply> {
    info!("Executing {} {}", request.method, request.path);
    backend
        .call(request.method.clone(), &request.path, request.body.clone())
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::MockBackend;
    use crate::error::ConsoleError;
    use crate::resource::registry::get_resource;
    use serde_json::json;

    fn action<'a>(resource: &'a ResourceDef, name: &str) -> &'a ActionDef {
        resource
            .actions
            .iter()
            .find(|a| a.display_name == name)
            .unwrap()
    }

    #[tokio::test]
    async fn test_list_extracts_response_path() {
        let mock = MockBackend::new();
        mock.on(
            Method::GET,
            "/messaging/sqs/queues",
            json!({"success": true, "queues": [{"name": "orders"}, {"name": "dead-letter"}]}),
        );
        let queues = get_resource("sqs-queues").unwrap();

        let items = list_resources(&mock, queues, &[]).await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["name"], "orders");
    }

    #[tokio::test]
    async fn test_list_sub_resource_encodes_parent() {
        let mock = MockBackend::new();
        let streams = get_resource("log-streams").unwrap();
        let parents = [json!({"name": "/aws/lambda/fn"})];

        list_resources(&mock, streams, &parents).await.unwrap();
        let calls = mock.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].path.contains("%2Faws%2Flambda%2Ffn"));
    }

    #[tokio::test]
    async fn test_list_with_body_posts_parent_values() {
        let mock = MockBackend::new();
        mock.on(
            Method::POST,
            "/messaging/sqs/messages/receive",
            json!({"success": true, "messages": [{"MessageId": "m-1", "ReceiptHandle": "rh-1", "Body": "hi"}]}),
        );
        let messages = get_resource("sqs-messages").unwrap();
        let parents = [json!({"name": "orders", "url": "https://sqs/1/orders"})];

        let items = list_resources(&mock, messages, &parents).await.unwrap();
        assert_eq!(items.len(), 1);
        let calls = mock.calls_to(Method::POST, "/messaging/sqs/messages/receive");
        assert_eq!(
            calls[0].body,
            Some(json!({"queue_url": "https://sqs/1/orders", "max_messages": 10}))
        );
    }

    #[tokio::test]
    async fn test_list_rejected_is_error() {
        let mock = MockBackend::new();
        mock.on(
            Method::GET,
            "/secrets/list",
            json!({"success": false, "message": "AccessDenied"}),
        );
        let err = list_resources(&mock, get_resource("secrets").unwrap(), &[])
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "AccessDenied");
    }

    #[test]
    fn test_body_defaults_to_form_values() {
        let owners = get_resource("catalog-owners").unwrap();
        let create = &owners.actions[owners.create_action().unwrap()];
        let form = json!({"name": "payments"});
        let scope = Scope::default().with_form(Some(&form));

        let request = ActionRequest::for_action(create, &scope).unwrap();
        assert_eq!(request.method, Method::POST);
        assert_eq!(request.body, Some(json!({"name": "payments"})));
    }

    #[test]
    fn test_delete_with_body_template() {
        let queues = get_resource("sqs-queues").unwrap();
        let delete = action(queues, "Delete Queue");
        let item = json!({"name": "orders", "url": "https://sqs.eu-west-1/123/orders"});
        let key = queues.natural_key(&item).unwrap();
        let scope = Scope::item(&key, &item);

        let request = ActionRequest::for_action(delete, &scope).unwrap();
        assert_eq!(request.method, Method::DELETE);
        assert_eq!(
            request.body,
            Some(json!({"queue_url": "https://sqs.eu-west-1/123/orders"}))
        );
    }

    #[test]
    fn test_missing_key_never_builds_request() {
        let secrets = get_resource("secrets").unwrap();
        let restore = action(secrets, "Restore");
        let err = ActionRequest::for_action(restore, &Scope::default()).unwrap_err();
        assert!(matches!(err, ConsoleError::Validation(_)));
    }

    #[tokio::test]
    async fn test_fetch_detail_uses_detail_endpoint() {
        let mock = MockBackend::new();
        mock.on(
            Method::GET,
            "/secrets/db%2Fprod",
            json!({"success": true, "name": "db/prod", "rotation_enabled": false}),
        );
        let secrets = get_resource("secrets").unwrap();
        let detail = fetch_detail(&mock, secrets, &json!({"name": "db/prod"}), &[])
            .await
            .unwrap();
        assert_eq!(detail, json!({"name": "db/prod", "rotation_enabled": false}));
    }

    #[tokio::test]
    async fn test_fetch_detail_without_endpoint_returns_row() {
        let mock = MockBackend::new();
        let row = json!({"name": "orders", "url": "u"});
        let detail = fetch_detail(&mock, get_resource("sqs-queues").unwrap(), &row, &[])
            .await
            .unwrap();
        assert_eq!(detail, row);
        assert_eq!(mock.call_count(), 0);
    }
}
