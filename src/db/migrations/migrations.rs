// 数据库迁移脚本定义

use super::Migration;

/// 架构验证时必须存在的表
pub const REQUIRED_TABLES: [&str; 7] = [
    "users",
    "chats",
    "messages",
    "media",
    "emergency_flows",
    "chat_exports",
    "documents",
];

/// 获取所有迁移，按版本升序
pub fn get_all_migrations() -> Vec<Migration> {
    vec![
        create_users_table(),
        create_chat_tables(),
        create_emergency_flows_table(),
        create_chat_exports_table(),
        create_documents_table(),
    ]
}

fn create_users_table() -> Migration {
    Migration {
        version: "20240601_000001".to_string(),
        name: "create_users_table".to_string(),
        description: "创建用户表".to_string(),
        up_sql: r#"
            CREATE TYPE user_role AS ENUM ('admin', 'employee');

            CREATE TABLE users (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                username VARCHAR(100) NOT NULL UNIQUE,
                password_hash VARCHAR(255) NOT NULL,
                display_name VARCHAR(255) NOT NULL,
                role user_role NOT NULL DEFAULT 'employee',
                department VARCHAR(255),
                description TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
        "#
        .to_string(),
        down_sql: r#"
            DROP TABLE IF EXISTS users;
            DROP TYPE IF EXISTS user_role;
        "#
        .to_string(),
    }
}

fn create_chat_tables() -> Migration {
    Migration {
        version: "20240601_000002".to_string(),
        name: "create_chat_tables".to_string(),
        description: "创建聊天、消息和媒体表".to_string(),
        up_sql: r#"
            CREATE TABLE chats (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                title VARCHAR(255),
                created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX idx_chats_user_id ON chats(user_id);

            CREATE TABLE messages (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                chat_id UUID NOT NULL REFERENCES chats(id) ON DELETE CASCADE,
                sender_id UUID REFERENCES users(id) ON DELETE SET NULL,
                content TEXT NOT NULL,
                is_ai_response BOOLEAN NOT NULL DEFAULT FALSE,
                created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX idx_messages_chat_id_created_at ON messages(chat_id, created_at);

            CREATE TABLE media (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                message_id UUID NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
                type VARCHAR(50) NOT NULL,
                url TEXT NOT NULL,
                description TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX idx_media_message_id ON media(message_id);
        "#
        .to_string(),
        down_sql: r#"
            DROP TABLE IF EXISTS media;
            DROP TABLE IF EXISTS messages;
            DROP TABLE IF EXISTS chats;
        "#
        .to_string(),
    }
}

fn create_emergency_flows_table() -> Migration {
    Migration {
        version: "20240601_000003".to_string(),
        name: "create_emergency_flows_table".to_string(),
        description: "创建故障排查流程表".to_string(),
        up_sql: r#"
            CREATE TABLE emergency_flows (
                id VARCHAR(128) PRIMARY KEY,
                title VARCHAR(255) NOT NULL,
                description TEXT,
                keyword TEXT,
                steps JSONB NOT NULL DEFAULT '[]',
                extra JSONB NOT NULL DEFAULT '{}',
                created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX idx_emergency_flows_updated_at ON emergency_flows(updated_at);
        "#
        .to_string(),
        down_sql: r#"
            DROP TABLE IF EXISTS emergency_flows;
        "#
        .to_string(),
    }
}

fn create_chat_exports_table() -> Migration {
    Migration {
        version: "20240601_000004".to_string(),
        name: "create_chat_exports_table".to_string(),
        description: "创建聊天导出记录表".to_string(),
        up_sql: r#"
            CREATE TABLE chat_exports (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                chat_id UUID NOT NULL REFERENCES chats(id) ON DELETE CASCADE,
                user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                file_name VARCHAR(255) NOT NULL,
                exported_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX idx_chat_exports_chat_id ON chat_exports(chat_id, exported_at);
        "#
        .to_string(),
        down_sql: r#"
            DROP TABLE IF EXISTS chat_exports;
        "#
        .to_string(),
    }
}

fn create_documents_table() -> Migration {
    Migration {
        version: "20240601_000005".to_string(),
        name: "create_documents_table".to_string(),
        description: "创建知识库文档表".to_string(),
        up_sql: r#"
            CREATE TABLE documents (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                title VARCHAR(255) NOT NULL,
                content TEXT NOT NULL,
                user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                chunk_count INTEGER NOT NULL DEFAULT 0,
                created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX idx_documents_created_at ON documents(created_at);
        "#
        .to_string(),
        down_sql: r#"
            DROP TABLE IF EXISTS documents;
        "#
        .to_string(),
    }
}
