//! Tool Collection - 에이전트 하나가 쓰는 도구 모음
//!
//! 등록 순서를 유지하고 이름으로 조회/실행합니다.
//!
//! ## 사용법
//! ```ignore
//! let mut tools = ToolCollection::new();
//! tools.add_tool(Arc::new(BashTool::new(sandbox.clone())));
//! tools.add_tools(host.tools());
//!
//! // LLM에 넘길 함수 정의
//! let params = tools.to_params();
//!
//! // 이름으로 실행 (없는 이름은 에러 결과)
//! let result = tools.execute("bash", json!({"command": "ls"})).await;
//! ```

use pilot_foundation::{Tool, ToolResult};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// 도구 모음
#[derive(Default, Clone)]
pub struct ToolCollection {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tools(tools: Vec<Arc<dyn Tool>>) -> Self {
        let mut collection = Self::new();
        collection.add_tools(tools);
        collection
    }

    /// 도구 추가
    ///
    /// 같은 이름이 이미 있으면 경고 후 건너뜁니다. 추가됐으면 true.
    pub fn add_tool(&mut self, tool: Arc<dyn Tool>) -> bool {
        let name = tool.name().to_string();
        if self.index.contains_key(&name) {
            warn!("Tool {} already exists in collection, skipping", name);
            return false;
        }
        self.index.insert(name, self.tools.len());
        self.tools.push(tool);
        true
    }

    pub fn add_tools(&mut self, tools: impl IntoIterator<Item = Arc<dyn Tool>>) {
        for tool in tools {
            self.add_tool(tool);
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.index.get(name).map(|&i| Arc::clone(&self.tools[i]))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// 등록 순서대로 이름
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Tool>> {
        self.tools.iter()
    }

    /// OpenAI function calling 형식 목록
    pub fn to_params(&self) -> Vec<Value> {
        self.tools.iter().map(|t| t.to_param()).collect()
    }

    /// 이름으로 도구 실행
    ///
    /// 실패는 모두 에러 결과로 돌려줍니다.
    pub async fn execute(&self, name: &str, input: Value) -> ToolResult {
        let Some(tool) = self.get(name) else {
            return ToolResult::error(format!("Tool {} is invalid", name));
        };

        debug!(tool = %name, "Executing tool");
        match tool.execute(input).await {
            Ok(result) => result,
            Err(e) => ToolResult::error(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pilot_foundation::{Error, Result};
    use serde_json::json;

    struct EchoTool(&'static str);

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            self.0
        }

        fn description(&self) -> &str {
            "echo input"
        }

        fn parameters(&self) -> Value {
            json!({"type": "object"})
        }

        async fn execute(&self, input: Value) -> Result<ToolResult> {
            if input.get("fail").is_some() {
                return Err(Error::Tool("boom".to_string()));
            }
            Ok(ToolResult::success(input.to_string()))
        }
    }

    #[test]
    fn test_order_and_duplicates() {
        let mut tools = ToolCollection::new();
        assert!(tools.add_tool(Arc::new(EchoTool("b"))));
        assert!(tools.add_tool(Arc::new(EchoTool("a"))));
        assert!(!tools.add_tool(Arc::new(EchoTool("b"))));

        assert_eq!(tools.names(), vec!["b", "a"]);
        assert_eq!(tools.len(), 2);

        let params = tools.to_params();
        assert_eq!(params[0]["function"]["name"], "b");
        assert_eq!(params[1]["type"], "function");
    }

    #[tokio::test]
    async fn test_execute_unknown_tool() {
        let tools = ToolCollection::from_tools(vec![Arc::new(EchoTool("echo"))]);

        let result = tools.execute("missing", json!({})).await;
        assert_eq!(result.error.as_deref(), Some("Tool missing is invalid"));

        let result = tools.execute("echo", json!({"x": 1})).await;
        assert_eq!(result.output, r#"{"x":1}"#);

        let result = tools.execute("echo", json!({"fail": true})).await;
        assert!(result.is_error());
    }
}
