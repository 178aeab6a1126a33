//! Shared fixtures: a throwaway repository root and a rule-driven manager

#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::sync::Arc;

use archlens::config::AgentsConfig;
use archlens::{
    AgentManager, DiagramStore, HeuristicScanner, LocalRepositorySource, RulePlanner,
    TemplateResponder, TimeoutConfig, ToolEnv, ToolRegistry, Workflow,
};
use tempfile::TempDir;

pub fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

/// Two checkouts: a Python shop and a Go billing service
pub fn repositories() -> TempDir {
    let temp = TempDir::new().unwrap();
    let root = temp.path();

    write(
        root,
        "shop/orders/service.py",
        "import requests\n\nclass OrderService:\n    def checkout(self, cart):\n        return cart\n",
    );
    write(
        root,
        "shop/api/routes.py",
        "from flask import Flask\napp = Flask(__name__)\n\n@app.route(\"/orders\")\ndef list_orders():\n    return []\n",
    );
    write(
        root,
        "billing/main.go",
        "package main\n\nimport \"net/http\"\n\ntype InvoiceService struct{}\n\nfunc main() {\n\thttp.ListenAndServe(\":8080\", nil)\n}\n",
    );
    temp
}

pub fn env(root: &Path) -> ToolEnv {
    ToolEnv::new(
        Arc::new(DiagramStore::new()),
        Arc::new(LocalRepositorySource::new(root)),
        Arc::new(HeuristicScanner::new().unwrap()),
        TimeoutConfig::default(),
    )
}

pub fn workflow() -> Arc<Workflow> {
    Arc::new(Workflow::new(
        Arc::new(ToolRegistry::with_builtin_tools().unwrap()),
        Arc::new(RulePlanner::new().unwrap()),
        Arc::new(TemplateResponder),
    ))
}

pub fn manager(root: &Path, max_agents: usize) -> AgentManager {
    AgentManager::new(
        workflow(),
        env(root),
        &AgentsConfig {
            max_agents,
            history_limit: 20,
        },
    )
}
