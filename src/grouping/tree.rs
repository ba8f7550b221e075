//! Directory tree built from a flat file list, for display.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::Serialize;

use super::FileGrouper;

/// One directory in the tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeNode {
    pub name: String,
    /// Full relative path, empty for the root
    pub path: String,
    pub depth: usize,
    /// File names directly inside this directory
    pub files: Vec<String>,
    /// Indices of child directories, sorted by name
    pub children: Vec<usize>,
    /// Files in this directory and all descendants
    pub total_files: usize,
}

/// Arena of directory nodes; index 0 is the root
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryTree {
    nodes: Vec<TreeNode>,
}

impl DirectoryTree {
    /// Build the tree of `files` relative to the grouper's base
    pub fn build(files: &[PathBuf], grouper: &FileGrouper) -> Self {
        let mut nodes = vec![TreeNode {
            name: ".".to_string(),
            path: String::new(),
            depth: 0,
            files: Vec::new(),
            children: Vec::new(),
            total_files: 0,
        }];
        let mut index: HashMap<String, usize> = HashMap::new();

        for file in files {
            let relative = grouper.relative_key_path(file);
            let mut parts: Vec<&str> = relative.split('/').filter(|p| !p.is_empty()).collect();
            let Some(file_name) = parts.pop() else {
                continue;
            };

            let mut parent = 0;
            let mut path = String::new();
            for (depth, part) in parts.into_iter().enumerate() {
                if !path.is_empty() {
                    path.push('/');
                }
                path.push_str(part);

                parent = match index.get(&path) {
                    Some(&id) => id,
                    None => {
                        let id = nodes.len();
                        nodes.push(TreeNode {
                            name: part.to_string(),
                            path: path.clone(),
                            depth: depth + 1,
                            files: Vec::new(),
                            children: Vec::new(),
                            total_files: 0,
                        });
                        nodes[parent].children.push(id);
                        index.insert(path.clone(), id);
                        id
                    }
                };
            }
            nodes[parent].files.push(file_name.to_string());
        }

        // Children always have larger indices than their parent, so a reverse
        // sweep sees every subtree total before its parent needs it
        for id in (0..nodes.len()).rev() {
            let nested: usize = nodes[id]
                .children
                .iter()
                .map(|&child| nodes[child].total_files)
                .sum();
            nodes[id].total_files = nodes[id].files.len() + nested;
        }

        for id in 0..nodes.len() {
            let mut children = std::mem::take(&mut nodes[id].children);
            children.sort_by(|a, b| nodes[*a].name.cmp(&nodes[*b].name));
            nodes[id].children = children;
        }

        Self { nodes }
    }

    pub fn root(&self) -> &TreeNode {
        &self.nodes[0]
    }

    pub fn node(&self, id: usize) -> Option<&TreeNode> {
        self.nodes.get(id)
    }

    /// Node for a relative directory path (`""` or `"."` for the root)
    pub fn find(&self, path: &str) -> Option<&TreeNode> {
        let path = path.trim_matches('/');
        if path.is_empty() || path == "." {
            return Some(self.root());
        }
        self.nodes.iter().find(|n| n.path == path)
    }

    pub fn children<'a>(&'a self, node: &'a TreeNode) -> impl Iterator<Item = &'a TreeNode> + 'a {
        node.children.iter().map(move |&id| &self.nodes[id])
    }

    pub fn total_files(&self) -> usize {
        self.root().total_files
    }

    /// Number of directory nodes including the root
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total_files() == 0
    }

    /// Render as indented lines, directories first then files
    pub fn render(&self, unicode: bool) -> Vec<String> {
        let glyphs = if unicode {
            Glyphs {
                branch: "├── ",
                last: "└── ",
                pipe: "│   ",
                space: "    ",
            }
        } else {
            Glyphs {
                branch: "|-- ",
                last: "`-- ",
                pipe: "|   ",
                space: "    ",
            }
        };

        let root = self.root();
        let mut lines = vec![format!(". ({})", plural_files(root.total_files))];
        self.render_children(root, "", &glyphs, &mut lines);
        lines
    }

    fn render_children(&self, node: &TreeNode, prefix: &str, glyphs: &Glyphs, out: &mut Vec<String>) {
        let entries = node.children.len() + node.files.len();
        let mut position = 0;

        for child in self.children(node) {
            position += 1;
            let last = position == entries;
            out.push(format!(
                "{prefix}{}{}/ ({})",
                if last { glyphs.last } else { glyphs.branch },
                child.name,
                plural_files(child.total_files)
            ));
            let nested = format!("{prefix}{}", if last { glyphs.space } else { glyphs.pipe });
            self.render_children(child, &nested, glyphs, out);
        }

        for file in &node.files {
            position += 1;
            let last = position == entries;
            out.push(format!(
                "{prefix}{}{file}",
                if last { glyphs.last } else { glyphs.branch }
            ));
        }
    }
}

struct Glyphs {
    branch: &'static str,
    last: &'static str,
    pipe: &'static str,
    space: &'static str,
}

fn plural_files(n: usize) -> String {
    if n == 1 {
        "1 file".to_string()
    } else {
        format!("{n} files")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grouping::GroupBy;

    fn build(names: &[&str]) -> DirectoryTree {
        let files: Vec<PathBuf> = names.iter().map(PathBuf::from).collect();
        DirectoryTree::build(&files, &FileGrouper::new(GroupBy::Directory))
    }

    #[test]
    fn test_tree_shape_and_totals() {
        let tree = build(&["a/x.ts", "a/y.ts", "b/z.ts"]);

        let root = tree.root();
        assert_eq!(root.depth, 0);
        assert_eq!(root.total_files, 3);
        let names: Vec<_> = tree.children(root).map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(tree.find("a").unwrap().total_files, 2);
        assert_eq!(tree.find("b").unwrap().files, vec!["z.ts"]);
    }

    #[test]
    fn test_nodes_are_memoized() {
        let tree = build(&["src/a/one.rs", "src/a/two.rs", "src/b/three.rs", "src/lib.rs"]);

        // root, src, src/a, src/b
        assert_eq!(tree.len(), 4);
        let src = tree.find("src").unwrap();
        assert_eq!(src.depth, 1);
        assert_eq!(src.files, vec!["lib.rs"]);
        assert_eq!(src.total_files, 4);
        assert_eq!(tree.find("src/a").unwrap().depth, 2);
    }

    #[test]
    fn test_render() {
        let tree = build(&["a/x.ts", "a/y.ts", "b/z.ts", "top.md"]);

        assert_eq!(
            tree.render(true),
            vec![
                ". (4 files)",
                "├── a/ (2 files)",
                "│   ├── x.ts",
                "│   └── y.ts",
                "├── b/ (1 file)",
                "│   └── z.ts",
                "└── top.md",
            ]
        );
        assert_eq!(tree.render(false)[6], "`-- top.md");
    }

    #[test]
    fn test_empty_tree() {
        let tree = build(&[]);
        assert!(tree.is_empty());
        assert_eq!(tree.render(true), vec![". (0 files)"]);
    }
}
