//! Fallback artifact templates
//!
//! Every artifact-producing role has a template rendition so a dead
//! provider never leaves the pipeline empty-handed. The templates form a
//! minimal but runnable FastAPI + React CRUD app.

use std::collections::BTreeMap;

const BACKEND_MAIN: &str = r#""""FastAPI backend for {project_name}."""
from datetime import datetime
from typing import List, Optional

from fastapi import FastAPI, HTTPException
from fastapi.middleware.cors import CORSMiddleware
from pydantic import BaseModel

app = FastAPI(title="{project_name}", version="1.0.0")

app.add_middleware(
    CORSMiddleware,
    allow_origins=["http://localhost:3000", "http://localhost:5173"],
    allow_credentials=True,
    allow_methods=["*"],
    allow_headers=["*"],
)


class ItemBase(BaseModel):
    title: str
    description: Optional[str] = None


class ItemCreate(ItemBase):
    pass


class Item(ItemBase):
    id: int
    created_at: datetime


items_db: List[dict] = []
item_counter = 0


@app.get("/")
def root():
    return {"message": "Welcome to {project_name}", "docs": "/docs"}


@app.get("/health")
def health():
    return {"status": "ok"}


@app.get("/items", response_model=List[Item])
def list_items():
    return items_db


@app.post("/items", response_model=Item, status_code=201)
def create_item(item: ItemCreate):
    global item_counter
    item_counter += 1
    new_item = {
        "id": item_counter,
        "title": item.title,
        "description": item.description,
        "created_at": datetime.utcnow(),
    }
    items_db.append(new_item)
    return new_item


@app.get("/items/{item_id}", response_model=Item)
def get_item(item_id: int):
    for item in items_db:
        if item["id"] == item_id:
            return item
    raise HTTPException(status_code=404, detail="Item not found")


@app.delete("/items/{item_id}")
def delete_item(item_id: int):
    for i, item in enumerate(items_db):
        if item["id"] == item_id:
            items_db.pop(i)
            return {"message": "Item deleted"}
    raise HTTPException(status_code=404, detail="Item not found")
"#;

const BACKEND_REQUIREMENTS: &str = r#"fastapi>=0.110.0
uvicorn[standard]>=0.27.0
pydantic>=2.0.0
"#;

const BACKEND_TESTS: &str = r#""""Tests for the {project_name} backend."""
from fastapi.testclient import TestClient

from main import app, items_db

client = TestClient(app)


def setup_function():
    items_db.clear()


def test_health():
    response = client.get("/health")
    assert response.status_code == 200
    assert response.json() == {"status": "ok"}


def test_create_and_list_items():
    response = client.post("/items", json={"title": "First"})
    assert response.status_code == 201
    assert response.json()["title"] == "First"

    response = client.get("/items")
    assert response.status_code == 200
    assert len(response.json()) == 1


def test_get_missing_item_returns_404():
    response = client.get("/items/999")
    assert response.status_code == 404


def test_delete_item():
    created = client.post("/items", json={"title": "Doomed"}).json()
    response = client.delete(f"/items/{created['id']}")
    assert response.status_code == 200
    assert client.get("/items").json() == []
"#;

const FRONTEND_PACKAGE_JSON: &str = r#"{
  "name": "{package_name}",
  "version": "1.0.0",
  "type": "module",
  "scripts": {
    "dev": "vite",
    "build": "vite build",
    "preview": "vite preview"
  },
  "dependencies": {
    "react": "^18.2.0",
    "react-dom": "^18.2.0",
    "axios": "^1.6.0"
  },
  "devDependencies": {
    "vite": "^5.0.0",
    "@vitejs/plugin-react": "^4.2.0"
  }
}
"#;

const FRONTEND_INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>{project_name}</title>
</head>
<body>
  <div id="root"></div>
  <script type="module" src="/src/main.jsx"></script>
</body>
</html>
"#;

const FRONTEND_VITE_CONFIG: &str = r#"import { defineConfig } from 'vite';
import react from '@vitejs/plugin-react';

export default defineConfig({
  plugins: [react()],
  server: {
    port: 3000,
    proxy: {
      '/api': {
        target: 'http://localhost:8000',
        changeOrigin: true,
        rewrite: (path) => path.replace(/^\/api/, '')
      }
    }
  }
});
"#;

const FRONTEND_MAIN_JSX: &str = r#"import React from 'react';
import ReactDOM from 'react-dom/client';
import App from './App';

ReactDOM.createRoot(document.getElementById('root')).render(
  <React.StrictMode>
    <App />
  </React.StrictMode>
);
"#;

const FRONTEND_APP_JSX: &str = r#"import React, { useState, useEffect } from 'react';
import axios from 'axios';

const API_URL = 'http://localhost:8000';

export default function App() {
  const [items, setItems] = useState([]);
  const [title, setTitle] = useState('');
  const [loading, setLoading] = useState(true);

  useEffect(() => {
    fetchItems();
  }, []);

  const fetchItems = async () => {
    try {
      const res = await axios.get(`${API_URL}/items`);
      setItems(res.data);
    } catch (err) {
      console.error('Error fetching items:', err);
    } finally {
      setLoading(false);
    }
  };

  const addItem = async (e) => {
    e.preventDefault();
    if (!title.trim()) return;
    await axios.post(`${API_URL}/items`, { title });
    setTitle('');
    fetchItems();
  };

  const deleteItem = async (id) => {
    await axios.delete(`${API_URL}/items/${id}`);
    fetchItems();
  };

  return (
    <div style={{ padding: '2rem', maxWidth: '800px', margin: '0 auto' }}>
      <h1>{project_name}</h1>
      <form onSubmit={addItem}>
        <input
          type="text"
          value={title}
          onChange={(e) => setTitle(e.target.value)}
          placeholder="Title"
        />
        <button type="submit">Add</button>
      </form>
      {loading ? (
        <p>Loading...</p>
      ) : (
        <ul>
          {items.map((item) => (
            <li key={item.id}>
              {item.title}
              <button onClick={() => deleteItem(item.id)}>Delete</button>
            </li>
          ))}
        </ul>
      )}
    </div>
  );
}
"#;

fn package_name(project_name: &str) -> String {
    let name: String = project_name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    let trimmed = name.trim_matches('-');
    if trimmed.is_empty() {
        "generated-app".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Template backend artifacts
pub fn backend_artifacts(project_name: &str) -> BTreeMap<String, String> {
    let mut files = BTreeMap::new();
    files.insert(
        "backend/main.py".to_string(),
        BACKEND_MAIN.replace("{project_name}", project_name),
    );
    files.insert(
        "backend/requirements.txt".to_string(),
        BACKEND_REQUIREMENTS.to_string(),
    );
    files
}

/// Template frontend artifacts
pub fn frontend_artifacts(project_name: &str) -> BTreeMap<String, String> {
    let mut files = BTreeMap::new();
    files.insert(
        "frontend/package.json".to_string(),
        FRONTEND_PACKAGE_JSON.replace("{package_name}", &package_name(project_name)),
    );
    files.insert(
        "frontend/index.html".to_string(),
        FRONTEND_INDEX_HTML.replace("{project_name}", project_name),
    );
    files.insert(
        "frontend/vite.config.js".to_string(),
        FRONTEND_VITE_CONFIG.to_string(),
    );
    files.insert("frontend/src/main.jsx".to_string(), FRONTEND_MAIN_JSX.to_string());
    files.insert(
        "frontend/src/App.jsx".to_string(),
        FRONTEND_APP_JSX.replace("{project_name}", project_name),
    );
    files
}

/// Template test artifacts
pub fn test_artifacts(project_name: &str) -> BTreeMap<String, String> {
    let mut files = BTreeMap::new();
    files.insert(
        "backend/test_main.py".to_string(),
        BACKEND_TESTS.replace("{project_name}", project_name),
    );
    files
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_template_interpolates_name() {
        let files = backend_artifacts("TodoApp");
        assert!(files["backend/main.py"].contains("title=\"TodoApp\""));
        assert!(files["backend/requirements.txt"].contains("fastapi"));
    }

    #[test]
    fn test_frontend_template_covers_required_files() {
        let files = frontend_artifacts("TodoApp");
        for path in [
            "frontend/package.json",
            "frontend/index.html",
            "frontend/vite.config.js",
            "frontend/src/main.jsx",
            "frontend/src/App.jsx",
        ] {
            assert!(files.contains_key(path), "missing {}", path);
        }
        // package.json stays valid JSON after interpolation
        serde_json::from_str::<serde_json::Value>(&files["frontend/package.json"]).unwrap();
    }

    #[test]
    fn test_package_name_sanitised() {
        assert_eq!(package_name("Todo App!"), "todo-app");
        assert_eq!(package_name("***"), "generated-app");
    }

    #[test]
    fn test_templates_cover_required_set_together() {
        let mut files = backend_artifacts("X");
        files.extend(frontend_artifacts("X"));
        for required in crate::domain::manifest::REQUIRED_FILES {
            assert!(files.contains_key(*required), "missing {}", required);
        }
    }
}
