// Macros file - tracing macros are imported within the macro definitions

/// Structured logging macros shared by the API, service, database and AI layers.
///
/// Every macro pins the field names (`operation`, `card_id`, `word`, `feature`,
/// `duration_ms`) so log queries work the same across layers.

// ============================================================================
// API Operation Logging Macros
// ============================================================================

/// Log the start of an API operation
#[macro_export]
macro_rules! log_api_start {
    ($operation:expr, card_id = $card_id:expr) => {
        tracing::debug!(
            operation = $operation,
            card_id = %$card_id,
            "API operation started"
        );
    };
    ($operation:expr, word = $word:expr) => {
        tracing::debug!(
            operation = $operation,
            word = %$word,
            "API operation started"
        );
    };
    ($operation:expr, feature = $feature:expr) => {
        tracing::debug!(
            operation = $operation,
            feature = %$feature,
            "API operation started"
        );
    };
    ($operation:expr) => {
        tracing::debug!(
            operation = $operation,
            "API operation started"
        );
    };
}

/// Log successful completion of an API operation
#[macro_export]
macro_rules! log_api_success {
    ($operation:expr, card_id = $card_id:expr, $msg:expr) => {
        tracing::info!(
            operation = $operation,
            card_id = %$card_id,
            "API operation completed: {}", $msg
        );
    };
    ($operation:expr, word = $word:expr, $msg:expr) => {
        tracing::info!(
            operation = $operation,
            word = %$word,
            "API operation completed: {}", $msg
        );
    };
    ($operation:expr, count = $count:expr, $msg:expr) => {
        tracing::info!(
            operation = $operation,
            count = $count,
            "API operation completed: {}", $msg
        );
    };
    ($operation:expr, $msg:expr) => {
        tracing::info!(
            operation = $operation,
            "API operation completed: {}", $msg
        );
    };
}

/// Log API operation errors
#[macro_export]
macro_rules! log_api_error {
    ($operation:expr, card_id = $card_id:expr, error = $error:expr, $msg:expr) => {
        tracing::error!(
            operation = $operation,
            card_id = %$card_id,
            error = %$error,
            "API operation failed: {}", $msg
        );
    };
    ($operation:expr, word = $word:expr, error = $error:expr, $msg:expr) => {
        tracing::error!(
            operation = $operation,
            word = %$word,
            error = %$error,
            "API operation failed: {}", $msg
        );
    };
    ($operation:expr, feature = $feature:expr, error = $error:expr, $msg:expr) => {
        tracing::error!(
            operation = $operation,
            feature = %$feature,
            error = %$error,
            "API operation failed: {}", $msg
        );
    };
    ($operation:expr, error = $error:expr, $msg:expr) => {
        tracing::error!(
            operation = $operation,
            error = %$error,
            "API operation failed: {}", $msg
        );
    };
}

/// Log API warnings, typically client errors
#[macro_export]
macro_rules! log_api_warn {
    ($operation:expr, card_id = $card_id:expr, $msg:expr) => {
        tracing::warn!(
            operation = $operation,
            card_id = %$card_id,
            "API operation warning: {}", $msg
        );
    };
    ($operation:expr, $msg:expr) => {
        tracing::warn!(
            operation = $operation,
            "API operation warning: {}", $msg
        );
    };
}

// ============================================================================
// Service Layer Logging Macros
// ============================================================================

#[macro_export]
macro_rules! log_service_start {
    ($service:expr, $operation:expr, card_id = $card_id:expr) => {
        tracing::info!(
            service = $service,
            operation = $operation,
            card_id = %$card_id,
            "Service operation started"
        );
    };
    ($service:expr, $operation:expr, word = $word:expr) => {
        tracing::info!(
            service = $service,
            operation = $operation,
            word = %$word,
            "Service operation started"
        );
    };
    ($service:expr, $operation:expr) => {
        tracing::info!(
            service = $service,
            operation = $operation,
            "Service operation started"
        );
    };
}

#[macro_export]
macro_rules! log_service_success {
    ($service:expr, $operation:expr, card_id = $card_id:expr, duration_ms = $duration:expr) => {
        tracing::info!(
            service = $service,
            operation = $operation,
            card_id = %$card_id,
            duration_ms = $duration,
            "Service operation completed successfully"
        );
    };
    ($service:expr, $operation:expr, word = $word:expr, duration_ms = $duration:expr) => {
        tracing::info!(
            service = $service,
            operation = $operation,
            word = %$word,
            duration_ms = $duration,
            "Service operation completed successfully"
        );
    };
    ($service:expr, $operation:expr, $msg:expr) => {
        tracing::info!(
            service = $service,
            operation = $operation,
            "Service operation completed: {}", $msg
        );
    };
}

#[macro_export]
macro_rules! log_service_error {
    ($service:expr, $operation:expr, card_id = $card_id:expr, error = $error:expr) => {
        tracing::error!(
            service = $service,
            operation = $operation,
            card_id = %$card_id,
            error = %$error,
            "Service operation failed"
        );
    };
    ($service:expr, $operation:expr, word = $word:expr, error = $error:expr) => {
        tracing::error!(
            service = $service,
            operation = $operation,
            word = %$word,
            error = %$error,
            "Service operation failed"
        );
    };
    ($service:expr, $operation:expr, error = $error:expr) => {
        tracing::error!(
            service = $service,
            operation = $operation,
            error = %$error,
            "Service operation failed"
        );
    };
}

#[macro_export]
macro_rules! log_service_warn {
    ($service:expr, $operation:expr, $msg:expr) => {
        tracing::warn!(
            service = $service,
            operation = $operation,
            "Service warning: {}",
            $msg
        );
    };
}

// ============================================================================
// Database Operation Logging Macros
// ============================================================================

#[macro_export]
macro_rules! log_db_operation {
    (debug, $operation:expr, card_id = $card_id:expr, duration_ms = $duration:expr) => {
        tracing::debug!(
            component = "database",
            operation = $operation,
            card_id = %$card_id,
            duration_ms = $duration,
            "Database operation completed"
        );
    };
    (debug, $operation:expr, count = $count:expr, duration_ms = $duration:expr) => {
        tracing::debug!(
            component = "database",
            operation = $operation,
            result_count = $count,
            duration_ms = $duration,
            "Database operation completed"
        );
    };
    (info, $operation:expr, $msg:expr) => {
        tracing::info!(
            component = "database",
            operation = $operation,
            "Database operation: {}", $msg
        );
    };
    (error, $operation:expr, error = $error:expr) => {
        tracing::error!(
            component = "database",
            operation = $operation,
            error = %$error,
            "Database operation failed"
        );
    };
}

// ============================================================================
// AI Pipeline Logging Macros
// ============================================================================

/// Log AI invocations with provider context
#[macro_export]
macro_rules! log_ai_operation {
    (start, $feature:expr, provider = $provider:expr, structured = $structured:expr) => {
        tracing::info!(
            component = "ai_service",
            feature = $feature,
            provider = %$provider,
            structured = $structured,
            "AI feature started"
        );
    };
    (success, $operation:expr, provider = $provider:expr, duration_ms = $duration:expr, tokens = $tokens:expr) => {
        tracing::info!(
            component = "ai_service",
            operation = $operation,
            provider = %$provider,
            duration_ms = $duration,
            tokens_used = $tokens,
            "AI operation completed successfully"
        );
    };
    (error, $operation:expr, provider = $provider:expr, error = $error:expr, retry_count = $retry:expr) => {
        tracing::error!(
            component = "ai_service",
            operation = $operation,
            provider = %$provider,
            error = %$error,
            retry_count = $retry,
            "AI operation failed"
        );
    };
    (warn, $operation:expr, $msg:expr) => {
        tracing::warn!(
            component = "ai_service",
            operation = $operation,
            "AI operation warning: {}", $msg
        );
    };
}

// ============================================================================
// System Event Logging Macros
// ============================================================================

#[macro_export]
macro_rules! log_system_event {
    (startup, component = $component:expr, $msg:expr) => {
        tracing::info!(
            event_type = "startup",
            component = $component,
            "System event: {}",
            $msg
        );
    };
    (shutdown, component = $component:expr, $msg:expr) => {
        tracing::info!(
            event_type = "shutdown",
            component = $component,
            "System event: {}",
            $msg
        );
    };
    (config, $msg:expr) => {
        tracing::info!(event_type = "configuration", "System event: {}", $msg);
    };
}

// ============================================================================
// Validation Logging Macros
// ============================================================================

#[macro_export]
macro_rules! log_validation {
    (success, $component:expr, $msg:expr) => {
        tracing::debug!(
            event_type = "validation",
            component = $component,
            result = "success",
            "Validation completed: {}", $msg
        );
    };
    (failure, $component:expr, error = $error:expr) => {
        tracing::warn!(
            event_type = "validation",
            component = $component,
            result = "failure",
            error = %$error,
            "Validation failed"
        );
    };
}
