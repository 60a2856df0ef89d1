//! Late-bound calls on scripting objects through `IDispatch`.

use windows::core::{Interface, BSTR, GUID, HRESULT, IUnknown, PCWSTR, VARIANT};
use windows::Win32::Foundation::{RPC_E_CALL_REJECTED, RPC_E_SERVERCALL_RETRYLATER};
use windows::Win32::System::Com::{
    IDispatch, DISPATCH_FLAGS, DISPATCH_METHOD, DISPATCH_PROPERTYGET, DISPATCH_PROPERTYPUT,
    DISPPARAMS,
};
use windows::Win32::System::Ole::DISPID_PROPERTYPUT;

use crate::errors::AutomationError;

const LOCALE_USER_DEFAULT: u32 = 0x0400;

/// Owned `IDispatch` pointer with name-based invocation.
#[derive(Debug, Clone)]
pub(crate) struct Dispatch(pub(crate) IDispatch);

impl Dispatch {
    pub(crate) fn from_unknown(unknown: &IUnknown) -> Result<Self, AutomationError> {
        unknown
            .cast::<IDispatch>()
            .map(Dispatch)
            .map_err(|e| com_error(e, "QueryInterface(IDispatch)"))
    }

    fn dispid(&self, name: &str) -> Result<i32, AutomationError> {
        let wide: Vec<u16> = name.encode_utf16().chain(std::iter::once(0)).collect();
        let names = [PCWSTR(wide.as_ptr())];
        let mut dispid = 0i32;
        unsafe {
            self.0
                .GetIDsOfNames(
                    &GUID::zeroed(),
                    names.as_ptr(),
                    1,
                    LOCALE_USER_DEFAULT,
                    &mut dispid,
                )
                .map_err(|e| com_error(e, name))?;
        }
        Ok(dispid)
    }

    fn invoke(
        &self,
        name: &str,
        flags: DISPATCH_FLAGS,
        args: &[VARIANT],
    ) -> Result<VARIANT, AutomationError> {
        let dispid = self.dispid(name)?;
        // IDispatch takes arguments right to left
        let mut reversed: Vec<VARIANT> = args.iter().rev().cloned().collect();
        let mut named = [DISPID_PROPERTYPUT];
        let mut params = DISPPARAMS {
            rgvarg: reversed.as_mut_ptr(),
            cArgs: reversed.len() as u32,
            ..Default::default()
        };
        if flags == DISPATCH_PROPERTYPUT {
            params.rgdispidNamedArgs = named.as_mut_ptr();
            params.cNamedArgs = 1;
        }

        let mut result = VARIANT::default();
        unsafe {
            self.0
                .Invoke(
                    dispid,
                    &GUID::zeroed(),
                    LOCALE_USER_DEFAULT,
                    flags,
                    &params,
                    Some(&mut result as *mut VARIANT),
                    None,
                    None,
                )
                .map_err(|e| com_error(e, name))?;
        }
        Ok(result)
    }

    pub(crate) fn call(&self, name: &str, args: &[VARIANT]) -> Result<VARIANT, AutomationError> {
        self.invoke(name, DISPATCH_METHOD, args)
    }

    pub(crate) fn get(&self, name: &str) -> Result<VARIANT, AutomationError> {
        self.invoke(name, DISPATCH_PROPERTYGET, &[])
    }

    pub(crate) fn put(&self, name: &str, value: VARIANT) -> Result<(), AutomationError> {
        self.invoke(name, DISPATCH_PROPERTYPUT, &[value]).map(|_| ())
    }

    pub(crate) fn get_string(&self, name: &str) -> Result<String, AutomationError> {
        let value = self.get(name)?;
        BSTR::try_from(&value)
            .map(|s| s.to_string())
            .map_err(|e| com_error(e, name))
    }

    /// Object-valued property or call result; `None` for `Nothing`.
    pub(crate) fn object(value: &VARIANT) -> Result<Option<Dispatch>, AutomationError> {
        if value.is_empty() {
            return Ok(None);
        }
        match IUnknown::try_from(value) {
            Ok(unknown) => Dispatch::from_unknown(&unknown).map(Some),
            Err(_) => Ok(None),
        }
    }

    pub(crate) fn get_object(&self, name: &str) -> Result<Option<Dispatch>, AutomationError> {
        Dispatch::object(&self.get(name)?)
    }
}

/// The remote side rejects calls while it is busy; those are worth retrying.
pub(crate) fn is_retryable_hresult(code: HRESULT) -> bool {
    code == RPC_E_CALL_REJECTED || code == RPC_E_SERVERCALL_RETRYLATER
}

pub(crate) fn com_error(e: windows::core::Error, operation: &str) -> AutomationError {
    let code = e.code();
    AutomationError::UIAutomationAPIError {
        message: format!("{operation}: {}", e.message()),
        com_error: Some(code.0),
        operation: operation.to_string(),
        is_retryable: is_retryable_hresult(code),
    }
}
